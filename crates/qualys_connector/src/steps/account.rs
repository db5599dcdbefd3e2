use super::{add_entity, add_relationship};
use crate::{Step, StepContext, StepId};
use qualys_error::QualysResult;
use qualys_graph::converters::{
    ACCOUNT_TYPE, SERVICE_TYPE, account_key, create_account_entity, create_service_entity,
};
use qualys_graph::{Relationship, RelationshipClass, ServiceKind};
use strum::IntoEnumIterator;
use tracing::{info, instrument};

/// Creates the account entity for the configured subscription.
pub struct FetchAccount;

#[async_trait::async_trait]
impl Step<StepContext> for FetchAccount {
    fn id(&self) -> StepId {
        StepId::FetchAccount
    }

    fn name(&self) -> &str {
        "Fetch Account"
    }

    fn depends_on(&self) -> Vec<StepId> {
        Vec::new()
    }

    #[instrument(skip_all)]
    async fn execute(&self, context: &StepContext) -> QualysResult<()> {
        let entity = create_account_entity(&context.config.api_url, &context.config.username);
        info!(key = %entity.key(), "Collected account");
        add_entity(context.job_state.as_ref(), entity).await?;
        Ok(())
    }
}

/// Creates one service entity per Qualys product, owned by the account.
pub struct FetchServices;

#[async_trait::async_trait]
impl Step<StepContext> for FetchServices {
    fn id(&self) -> StepId {
        StepId::FetchServices
    }

    fn name(&self) -> &str {
        "Fetch Services"
    }

    fn depends_on(&self) -> Vec<StepId> {
        vec![StepId::FetchAccount]
    }

    #[instrument(skip_all)]
    async fn execute(&self, context: &StepContext) -> QualysResult<()> {
        let job_state = context.job_state.as_ref();
        let account = account_key(&context.config.api_url);

        for kind in ServiceKind::iter() {
            let service = create_service_entity(&account, kind);
            let relationship = Relationship::between(
                RelationshipClass::Has,
                &account,
                ACCOUNT_TYPE,
                service.key(),
                SERVICE_TYPE,
            );
            add_entity(job_state, service).await?;
            add_relationship(job_state, relationship).await?;
        }

        info!("Collected services");
        Ok(())
    }
}
