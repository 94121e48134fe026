use std::collections::HashMap;
use std::sync::Arc;

use crate::auth::AuthnUserInfo;
use crate::context::ServerContext;
use crate::response::Response;

use super::features::FeaturesHandler;
use super::operations::OperationsHandler;
use super::permissions::PermissionsHandler;
use super::roles::RolesHandler;
use super::sessions::SessionsHandler;
use super::union::UnionResourceHandler;
use super::users::UsersHandler;
use super::{ResourceHandler, ResourceRequest};

/// Routes a typed resource request to the handler registered for the
/// resource name.
pub struct Dispatcher {
    handlers: HashMap<&'static str, Arc<UnionResourceHandler>>,
}

impl Dispatcher {
    pub fn new(ctx: &ServerContext) -> Self {
        let mut handlers = HashMap::new();

        let handler = FeaturesHandler::new(ctx.db.clone());
        handlers.insert(
            "features",
            Arc::new(UnionResourceHandler::Features(handler)),
        );

        let handler = OperationsHandler::new(ctx.db.clone());
        handlers.insert(
            "operations",
            Arc::new(UnionResourceHandler::Operations(handler)),
        );

        let handler = PermissionsHandler::new(ctx.db.clone(), ctx.store.clone());
        handlers.insert(
            "permissions",
            Arc::new(UnionResourceHandler::Permissions(handler)),
        );

        let handler = RolesHandler::new(ctx.db.clone(), ctx.store.clone());
        handlers.insert("roles", Arc::new(UnionResourceHandler::Roles(handler)));

        let handler = SessionsHandler::new(ctx.db.clone());
        handlers.insert(
            "sessions",
            Arc::new(UnionResourceHandler::Sessions(handler)),
        );

        let handler = UsersHandler::new(
            ctx.db.clone(),
            ctx.store.clone(),
            ctx.cfg.salt_length,
        );
        handlers.insert("users", Arc::new(UnionResourceHandler::Users(handler)));

        Self { handlers }
    }

    pub fn dispatch(
        &self,
        rsc_req: ResourceRequest,
        resource: &str,
        user: AuthnUserInfo,
    ) -> Response {
        let handler = match self.handlers.get(resource) {
            Some(handler) => handler,
            None => return Response::not_found("Resource not found"),
        };

        match rsc_req {
            ResourceRequest::Put(body) => handler.put(body, user),
            ResourceRequest::Patch(id, body) => handler.patch(id, body, user),
            ResourceRequest::List(query) => handler.list(query, user),
            ResourceRequest::Get(id) => handler.get(id, user),
            ResourceRequest::Delete(id, body) => handler.delete(id, body, user),
        }
    }
}
