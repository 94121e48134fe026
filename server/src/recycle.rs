use std::sync::Arc;
use std::time::Duration;

use log::{error, info};
use portal_misc::time;

use crate::context::ServerContext;

const RECYCLE_INTERVAL_SECS: u64 = 60 * 10;

/// Periodically expires active sessions whose last access is older than the
/// configured recycle window. Runs for the lifetime of the process.
pub async fn start_recycle(ctx: Arc<ServerContext>) {
    let window_secs = ctx.cfg.session_recycle_hours * 60 * 60;
    let mut intv = tokio::time::interval(Duration::from_secs(RECYCLE_INTERVAL_SECS));
    info!(
        "Starting session recycle loop, window {}h",
        ctx.cfg.session_recycle_hours
    );

    loop {
        intv.tick().await;

        let now = time::current_timestamp();
        let cutoff = now.saturating_sub(window_secs);
        match ctx
            .db
            .with_transaction(|tx| tx.expire_sessions_before(cutoff, now))
        {
            Ok(0) => {}
            Ok(count) => info!("Recycle expired {count} stale sessions"),
            Err(e) => error!("Session recycle error: {e:#}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use portal_misc::api::session::{Session, SESSION_ACTIVE, SESSION_EXPIRED};

    use crate::db::Database;

    use super::*;

    #[test]
    fn test_expire_sessions_before() {
        let db = Database::new_test();

        for (id, last_access) in [("session-old", 100), ("session-new", 5000)] {
            db.with_transaction(|tx| {
                tx.create_session(&Session {
                    id: id.to_string(),
                    user_id: "user-1".to_string(),
                    username: "user123".to_string(),
                    ip_address: "10.0.0.1".to_string(),
                    started: last_access,
                    last_access,
                    refresh_token: format!("token-{id}"),
                    status: SESSION_ACTIVE,
                    create_time: last_access,
                    update_time: last_access,
                })
            })
            .unwrap();
        }

        let count = db
            .with_transaction(|tx| tx.expire_sessions_before(1000, 6000))
            .unwrap();
        assert_eq!(count, 1);

        let old = db
            .with_transaction(|tx| tx.get_session("session-old"))
            .unwrap()
            .unwrap();
        assert_eq!(old.status, SESSION_EXPIRED);

        let fresh = db
            .with_transaction(|tx| tx.get_session("session-new"))
            .unwrap()
            .unwrap();
        assert_eq!(fresh.status, SESSION_ACTIVE);
    }
}
