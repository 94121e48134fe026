use portal_misc::api::Query;

use crate::auth::AuthnUserInfo;
use crate::response::Response;

use super::features::FeaturesHandler;
use super::operations::OperationsHandler;
use super::permissions::PermissionsHandler;
use super::roles::RolesHandler;
use super::sessions::SessionsHandler;
use super::users::UsersHandler;
use super::ResourceHandler;

/// A union type over all resource handlers.
pub enum UnionResourceHandler {
    Features(FeaturesHandler),
    Operations(OperationsHandler),
    Permissions(PermissionsHandler),
    Roles(RolesHandler),
    Sessions(SessionsHandler),
    Users(UsersHandler),
}

impl ResourceHandler for UnionResourceHandler {
    fn put(&self, body: String, user: AuthnUserInfo) -> Response {
        match self {
            UnionResourceHandler::Features(h) => h.put(body, user),
            UnionResourceHandler::Operations(h) => h.put(body, user),
            UnionResourceHandler::Permissions(h) => h.put(body, user),
            UnionResourceHandler::Roles(h) => h.put(body, user),
            UnionResourceHandler::Sessions(h) => h.put(body, user),
            UnionResourceHandler::Users(h) => h.put(body, user),
        }
    }

    fn patch(&self, id: String, body: String, user: AuthnUserInfo) -> Response {
        match self {
            UnionResourceHandler::Features(h) => h.patch(id, body, user),
            UnionResourceHandler::Operations(h) => h.patch(id, body, user),
            UnionResourceHandler::Permissions(h) => h.patch(id, body, user),
            UnionResourceHandler::Roles(h) => h.patch(id, body, user),
            UnionResourceHandler::Sessions(h) => h.patch(id, body, user),
            UnionResourceHandler::Users(h) => h.patch(id, body, user),
        }
    }

    fn list(&self, query: Query, user: AuthnUserInfo) -> Response {
        match self {
            UnionResourceHandler::Features(h) => h.list(query, user),
            UnionResourceHandler::Operations(h) => h.list(query, user),
            UnionResourceHandler::Permissions(h) => h.list(query, user),
            UnionResourceHandler::Roles(h) => h.list(query, user),
            UnionResourceHandler::Sessions(h) => h.list(query, user),
            UnionResourceHandler::Users(h) => h.list(query, user),
        }
    }

    fn get(&self, id: String, user: AuthnUserInfo) -> Response {
        match self {
            UnionResourceHandler::Features(h) => h.get(id, user),
            UnionResourceHandler::Operations(h) => h.get(id, user),
            UnionResourceHandler::Permissions(h) => h.get(id, user),
            UnionResourceHandler::Roles(h) => h.get(id, user),
            UnionResourceHandler::Sessions(h) => h.get(id, user),
            UnionResourceHandler::Users(h) => h.get(id, user),
        }
    }

    fn delete(&self, id: Option<String>, body: Option<String>, user: AuthnUserInfo) -> Response {
        match self {
            UnionResourceHandler::Features(h) => h.delete(id, body, user),
            UnionResourceHandler::Operations(h) => h.delete(id, body, user),
            UnionResourceHandler::Permissions(h) => h.delete(id, body, user),
            UnionResourceHandler::Roles(h) => h.delete(id, body, user),
            UnionResourceHandler::Sessions(h) => h.delete(id, body, user),
            UnionResourceHandler::Users(h) => h.delete(id, body, user),
        }
    }
}
