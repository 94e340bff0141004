use std::sync::Arc;

use sqlx::PgPool;

use crate::{
    config::Config,
    services::{
        audit_log::{AuditLogService, AuditLogServiceTrait},
        audit_report::AuditReportService,
    },
};

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
    pub audit_log: Arc<dyn AuditLogServiceTrait>,
    pub audit_report: AuditReportService,
}

impl AppState {
    pub fn new(pool: PgPool, config: Config) -> Self {
        let audit_log = Arc::new(AuditLogService::new(pool.clone()));
        let audit_report = AuditReportService::new(pool.clone(), config.time_zone);
        Self {
            pool,
            config,
            audit_log,
            audit_report,
        }
    }

    /// Swaps the audit write path, used by tests to observe recorded events.
    pub fn with_audit_log(mut self, audit_log: Arc<dyn AuditLogServiceTrait>) -> Self {
        self.audit_log = audit_log;
        self
    }
}
