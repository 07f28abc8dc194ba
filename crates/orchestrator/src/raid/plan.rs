//! The plan-generation boundary (SPEC_FULL §4.H).
//!
//! Plan generation's *content* is out of scope — it ultimately comes from an
//! LLM or a human — but its *shape* is fixed: an ordered `Vec<PlannedTask>`.
//! This trait is the same kind of seam as `AgentFactory`: the Orchestrator
//! depends on it without knowing or caring how a concrete implementation
//! produces a plan.

use async_trait::async_trait;
use undercity_kernel::PlannedTask;

use super::OrchestratorError;

#[async_trait]
pub trait PlanGenerator: Send + Sync {
    async fn generate_plan(&self, goal: &str) -> Result<Vec<PlannedTask>, OrchestratorError>;
}
