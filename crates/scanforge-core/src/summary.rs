use crate::aggregator::CategorizedFindings;
use crate::enricher::Enricher;
use tracing::warn;

/// One pipeline-level call for a devsecops recommendation, built from
/// aggregate counts only. Reuses the enricher's retry policy (documented
/// choice: the summary is no more important than any single finding, so it
/// gets the same budget). Failure yields `None`, never an abort.
pub async fn summarize(categorized: &CategorizedFindings, enricher: &Enricher) -> Option<String> {
    let prompt = summary_prompt(categorized);
    match enricher.call_with_retry(&prompt).await {
        Ok(text) => Some(text),
        Err(e) => {
            warn!(error = %e, "summary generation exhausted retries");
            None
        }
    }
}

fn summary_prompt(categorized: &CategorizedFindings) -> String {
    format!(
        "You are a DevSecOps and security engineering expert. Given the \
         following summary of security findings, recommend at least 3 \
         actionable improvements to the DevSecOps pipeline or process that \
         would help prevent or catch these issues earlier.\n\n\
         Findings Summary: {} critical, {} high, {} medium, {} low",
        categorized.critical.len(),
        categorized.high.len(),
        categorized.medium.len(),
        categorized.low.len(),
    )
}
