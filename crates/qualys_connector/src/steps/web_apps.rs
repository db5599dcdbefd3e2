use super::{WEB_APP_FINDING_QIDS, WEB_APP_IDS, add_entity, add_relationship, read_data, write_data};
use crate::{Step, StepContext, StepId};
use futures_util::{TryStreamExt, pin_mut};
use qualys_error::QualysResult;
use qualys_graph::converters::{
    SERVICE_TYPE, WEB_APP_FINDING_TYPE, WEB_APP_TYPE, account_key, create_web_app_entity,
    create_web_app_finding_entity, service_key, web_app_key,
};
use qualys_graph::{Relationship, RelationshipClass, ServiceKind};
use std::collections::BTreeSet;
use tracing::{info, instrument};

fn was_service_key(context: &StepContext) -> String {
    service_key(
        &account_key(&context.config.api_url),
        ServiceKind::WebApplicationScanning,
    )
}

/// Collects WAS web applications, each scanned by the WAS service.
pub struct FetchWebApps;

#[async_trait::async_trait]
impl Step<StepContext> for FetchWebApps {
    fn id(&self) -> StepId {
        StepId::FetchWebApps
    }

    fn name(&self) -> &str {
        "Fetch Web Apps"
    }

    fn depends_on(&self) -> Vec<StepId> {
        vec![StepId::FetchServices]
    }

    #[instrument(skip_all)]
    async fn execute(&self, context: &StepContext) -> QualysResult<()> {
        let job_state = context.job_state.as_ref();
        let service = was_service_key(context);
        let mut ids = BTreeSet::new();

        let web_apps = context.client.web_apps();
        pin_mut!(web_apps);
        while let Some(web_app) = web_apps.try_next().await? {
            let entity = create_web_app_entity(&web_app);
            let scans = Relationship::between(
                RelationshipClass::Scans,
                &service,
                SERVICE_TYPE,
                entity.key(),
                WEB_APP_TYPE,
            );
            if add_entity(job_state, entity).await? {
                add_relationship(job_state, scans).await?;
            }
            ids.insert(*web_app.id());
        }

        info!(count = ids.len(), "Collected web apps");
        write_data(job_state, WEB_APP_IDS, &ids).await
    }
}

/// Collects recent WAS findings for the collected web applications.
pub struct FetchWebAppFindings;

#[async_trait::async_trait]
impl Step<StepContext> for FetchWebAppFindings {
    fn id(&self) -> StepId {
        StepId::FetchWebAppFindings
    }

    fn name(&self) -> &str {
        "Fetch Web App Findings"
    }

    fn depends_on(&self) -> Vec<StepId> {
        vec![StepId::FetchWebApps]
    }

    #[instrument(skip_all)]
    async fn execute(&self, context: &StepContext) -> QualysResult<()> {
        let job_state = context.job_state.as_ref();
        let web_app_ids: Vec<u64> = read_data(job_state, WEB_APP_IDS).await?;
        let service = was_service_key(context);
        let since = context.config.findings_since(context.started_at);
        let mut qids = BTreeSet::new();
        let mut count = 0usize;

        let findings = context.client.web_app_findings(web_app_ids, since);
        pin_mut!(findings);
        while let Some(finding) = findings.try_next().await? {
            let entity = create_web_app_finding_entity(&finding);
            let finding_key = entity.key().clone();
            qids.insert(*finding.qid());
            if !add_entity(job_state, entity).await? {
                continue;
            }
            count += 1;

            let app_key = web_app_key(*finding.web_app().id());
            if job_state.has_key(&app_key).await {
                add_relationship(
                    job_state,
                    Relationship::between(
                        RelationshipClass::Has,
                        &app_key,
                        WEB_APP_TYPE,
                        &finding_key,
                        WEB_APP_FINDING_TYPE,
                    ),
                )
                .await?;
            }
            add_relationship(
                job_state,
                Relationship::between(
                    RelationshipClass::Identified,
                    &service,
                    SERVICE_TYPE,
                    &finding_key,
                    WEB_APP_FINDING_TYPE,
                ),
            )
            .await?;
        }

        info!(count, qids = qids.len(), %since, "Collected web app findings");
        write_data(job_state, WEB_APP_FINDING_QIDS, &qids).await
    }
}
