//! PostgreSQL Persistence
//!
//! One repository struct per entity, each a thin wrapper over `sqlx::PgPool`
//! queries with an explicit row-to-domain mapping, grounded on the teacher's
//! repository pattern (`DealRepository` et al. in `rust/src/database/`) and
//! its row/domain split in `ob-workflow::task_queue` (`TaskResultRow` ->
//! `TaskResult`).

mod audit_repository;
mod contract_repository;
mod deployment_repository;
mod error;
mod template_repository;
mod workflow_repository;

pub use audit_repository::AuditRepository;
pub use contract_repository::ContractRepository;
pub use deployment_repository::DeploymentRepository;
pub use error::PersistenceError;
pub use template_repository::TemplateRepository;
pub use workflow_repository::WorkflowRepository;
