use super::{HOST_FINDING_QIDS, WEB_APP_FINDING_QIDS, add_entity, read_data};
use crate::{Step, StepContext, StepId};
use futures_util::{TryStreamExt, pin_mut};
use qualys_error::QualysResult;
use qualys_graph::converters::{
    HOST_FINDING_TYPE, VULN_TYPE, WEB_APP_FINDING_TYPE, create_vuln_entity, vuln_key,
};
use qualys_graph::{Relationship, RelationshipClass};
use std::collections::BTreeSet;
use tracing::{info, instrument};

/// Collects knowledge base entries for every QID seen on a finding and
/// links each finding to its vulnerability.
pub struct FetchVulnerabilities;

#[async_trait::async_trait]
impl Step<StepContext> for FetchVulnerabilities {
    fn id(&self) -> StepId {
        StepId::FetchVulnerabilities
    }

    fn name(&self) -> &str {
        "Fetch Vulnerabilities"
    }

    fn depends_on(&self) -> Vec<StepId> {
        vec![StepId::FetchHostDetections, StepId::FetchWebAppFindings]
    }

    #[instrument(skip_all)]
    async fn execute(&self, context: &StepContext) -> QualysResult<()> {
        let job_state = context.job_state.as_ref();
        let mut qids: BTreeSet<u64> = read_data(job_state, HOST_FINDING_QIDS).await?;
        qids.extend(read_data::<BTreeSet<u64>>(job_state, WEB_APP_FINDING_QIDS).await?);

        let mut collected = 0usize;
        let vulns = context.client.vulnerabilities(qids.iter().copied().collect());
        pin_mut!(vulns);
        while let Some(vuln) = vulns.try_next().await? {
            if add_entity(job_state, create_vuln_entity(&vuln)).await? {
                collected += 1;
            }
        }

        let mut links = Vec::new();
        for finding_type in [HOST_FINDING_TYPE, WEB_APP_FINDING_TYPE] {
            for finding in job_state.entities_of_type(finding_type).await {
                let Some(qid) = finding.property("qid").and_then(|qid| qid.as_u64()) else {
                    continue;
                };
                let vuln = vuln_key(qid);
                if !job_state.has_key(&vuln).await {
                    continue;
                }
                let link = Relationship::between(
                    RelationshipClass::Is,
                    finding.key(),
                    finding_type,
                    &vuln,
                    VULN_TYPE,
                );
                if !job_state.has_key(link.key()).await {
                    links.push(link);
                }
            }
        }

        info!(
            requested = qids.len(),
            collected,
            links = links.len(),
            "Collected vulnerabilities"
        );
        job_state.add_relationships(links).await
    }
}
