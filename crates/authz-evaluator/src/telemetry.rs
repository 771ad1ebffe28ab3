//! Evaluation metrics descriptions

/// Register descriptions for every metric the evaluator records.
///
/// Call once after installing a recorder.
pub fn describe_metrics() {
    metrics::describe_counter!(
        "authz_policy_evaluations_total",
        "Total number of policy evaluations"
    );
    metrics::describe_counter!(
        "authz_policy_evaluation_errors_total",
        "Total number of failed policy evaluations by phase"
    );
    metrics::describe_counter!(
        "authz_policy_denials_total",
        "Total number of evaluations that produced a denial"
    );
    metrics::describe_histogram!(
        "authz_policy_evaluation_duration_seconds",
        metrics::Unit::Seconds,
        "Policy evaluation latency in seconds"
    );
}
