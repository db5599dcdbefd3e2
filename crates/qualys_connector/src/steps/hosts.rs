use super::{
    HOST_FINDING_QIDS, HOST_IDS, HOST_KEYS, add_entity, add_relationship, read_data, write_data,
};
use crate::{Step, StepContext, StepId};
use futures_util::{TryStreamExt, pin_mut};
use qualys_error::QualysResult;
use qualys_graph::converters::{
    HOST_FINDING_TYPE, HOST_TYPE, SERVICE_TYPE, account_key, create_host_entity,
    create_host_finding_entity, service_key,
};
use qualys_graph::{Relationship, RelationshipClass, ServiceKind};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, instrument};

fn vm_service_key(context: &StepContext) -> String {
    service_key(
        &account_key(&context.config.api_url),
        ServiceKind::VulnerabilityManagement,
    )
}

/// Collects recently scanned hosts from Asset Management.
pub struct FetchHosts;

#[async_trait::async_trait]
impl Step<StepContext> for FetchHosts {
    fn id(&self) -> StepId {
        StepId::FetchHosts
    }

    fn name(&self) -> &str {
        "Fetch Hosts"
    }

    fn depends_on(&self) -> Vec<StepId> {
        vec![StepId::FetchServices]
    }

    #[instrument(skip_all)]
    async fn execute(&self, context: &StepContext) -> QualysResult<()> {
        let job_state = context.job_state.as_ref();
        let service = vm_service_key(context);
        let since = context.config.scanned_since(context.started_at);
        let mut count = 0usize;
        let mut vm_hosts = BTreeMap::new();

        let hosts = context.client.host_assets(since);
        pin_mut!(hosts);
        while let Some(host) = hosts.try_next().await? {
            let entity = create_host_entity(&host);
            let scans = Relationship::between(
                RelationshipClass::Scans,
                &service,
                SERVICE_TYPE,
                entity.key(),
                HOST_TYPE,
            );
            let key = entity.key().clone();
            if add_entity(job_state, entity).await? {
                add_relationship(job_state, scans).await?;
                count += 1;
            }
            // Detections are keyed by the VM host id, not the asset id.
            if let Some(vm_id) = *host.qweb_host_id() {
                vm_hosts.insert(vm_id, key);
            }
        }

        info!(count, vm_hosts = vm_hosts.len(), %since, "Collected hosts");
        let vm_ids: Vec<u64> = vm_hosts.keys().copied().collect();
        write_data(job_state, HOST_IDS, &vm_ids).await?;
        write_data(job_state, HOST_KEYS, &vm_hosts).await
    }
}

/// Collects VM detections on the collected hosts.
pub struct FetchHostDetections;

#[async_trait::async_trait]
impl Step<StepContext> for FetchHostDetections {
    fn id(&self) -> StepId {
        StepId::FetchHostDetections
    }

    fn name(&self) -> &str {
        "Fetch Host Detections"
    }

    fn depends_on(&self) -> Vec<StepId> {
        vec![StepId::FetchHosts]
    }

    #[instrument(skip_all)]
    async fn execute(&self, context: &StepContext) -> QualysResult<()> {
        let job_state = context.job_state.as_ref();
        let host_ids: Vec<u64> = read_data(job_state, HOST_IDS).await?;
        let host_keys: BTreeMap<u64, String> = read_data(job_state, HOST_KEYS).await?;
        let service = vm_service_key(context);
        let mut qids = BTreeSet::new();
        let mut count = 0usize;

        let pages = context.client.host_detections(host_ids);
        pin_mut!(pages);
        while let Some(host) = pages.try_next().await? {
            let host_entity_key = host_keys.get(host.id());
            if host_entity_key.is_none() {
                debug!(host_id = *host.id(), "Detections for a host outside the collected set");
            }

            for detection in host.detections() {
                qids.insert(*detection.qid());
                let entity = create_host_finding_entity(&host, detection);
                let finding_key = entity.key().clone();
                if !add_entity(job_state, entity).await? {
                    continue;
                }
                count += 1;

                if let Some(host_entity_key) = host_entity_key {
                    add_relationship(
                        job_state,
                        Relationship::between(
                            RelationshipClass::Has,
                            host_entity_key,
                            HOST_TYPE,
                            &finding_key,
                            HOST_FINDING_TYPE,
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
                        HOST_FINDING_TYPE,
                    ),
                )
                .await?;
            }
        }

        info!(count, qids = qids.len(), "Collected host detections");
        write_data(job_state, HOST_FINDING_QIDS, &qids).await
    }
}
