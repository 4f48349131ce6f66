//! Jobs served by mock nodes

use dashmap::DashMap;
use flint_rpc::Value;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

/// Returns the name of the node that ran it
pub const NODE_NAME_JOB: &str = "NODE_NAME_JOB";
/// Returns its first argument, or nothing without arguments
pub const ECHO_JOB: &str = "ECHO_JOB";
/// Completes without a value
pub const VOID_JOB: &str = "VOID_JOB";
/// Sleeps for the number of milliseconds given as first argument, then
/// returns the node name
pub const SLEEP_JOB: &str = "SLEEP_JOB";
/// Always fails; the first string argument becomes the error text
pub const ERROR_JOB: &str = "ERROR_JOB";

/// Prefix of every mock node name
pub const NODE_RUNNER_PREFIX: &str = "flint_node_runner";

/// Node a job is running on
#[derive(Debug, Clone)]
pub struct JobContext {
    pub node_id: String,
    pub node_name: String,
}

/// Outcome of a job: an optional value or the server-side error text
pub type JobOutcome = std::result::Result<Option<Value>, String>;

pub type JobFuture = Pin<Box<dyn Future<Output = JobOutcome> + Send>>;

type JobFn = dyn Fn(JobContext, Vec<Value>) -> JobFuture + Send + Sync;

/// Named jobs shared by all nodes of a mock cluster
#[derive(Clone)]
pub struct JobRegistry {
    jobs: Arc<DashMap<String, Arc<JobFn>>>,
}

impl JobRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self {
            jobs: Arc::new(DashMap::new()),
        }
    }

    /// Registry with the built-in test jobs
    pub fn with_builtin_jobs() -> Self {
        let registry = Self::new();

        registry.register(NODE_NAME_JOB, |ctx, _args| async move {
            JobOutcome::Ok(Some(Value::String(ctx.node_name)))
        });

        registry.register(ECHO_JOB, |_ctx, args| async move {
            JobOutcome::Ok(args.into_iter().next())
        });

        registry.register(VOID_JOB, |_ctx, _args| async move { JobOutcome::Ok(None) });

        registry.register(SLEEP_JOB, |ctx, args| async move {
            let millis = match args.first() {
                Some(Value::Int64(ms)) => *ms as u64,
                Some(Value::Int32(ms)) => *ms as u64,
                Some(other) => {
                    return Err(format!("{} expects a duration, got {}", SLEEP_JOB, other.value_type()))
                }
                None => 0,
            };
            tokio::time::sleep(Duration::from_millis(millis)).await;
            JobOutcome::Ok(Some(Value::String(ctx.node_name)))
        });

        registry.register(ERROR_JOB, |ctx, args| async move {
            let message = args
                .first()
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap_or_else(|| "Job failed intentionally".to_string());
            JobOutcome::Err(format!("{} (on {})", message, ctx.node_name))
        });

        registry
    }

    /// Register or replace a job
    pub fn register<F, Fut>(&self, name: &str, job: F)
    where
        F: Fn(JobContext, Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = JobOutcome> + Send + 'static,
    {
        let job: Arc<JobFn> =
            Arc::new(move |ctx: JobContext, args: Vec<Value>| -> JobFuture { Box::pin(job(ctx, args)) });
        self.jobs.insert(name.to_string(), job);
    }

    /// Start the job called `name`, if registered
    pub fn run(&self, name: &str, ctx: JobContext, args: Vec<Value>) -> Option<JobFuture> {
        let job = self.jobs.get(name)?.value().clone();
        Some(job(ctx, args))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.jobs.contains_key(name)
    }
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::with_builtin_jobs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> JobContext {
        JobContext {
            node_id: "id-0".to_string(),
            node_name: format!("{}_0", NODE_RUNNER_PREFIX),
        }
    }

    #[tokio::test]
    async fn test_builtin_jobs() {
        let registry = JobRegistry::with_builtin_jobs();

        let name = registry.run(NODE_NAME_JOB, ctx(), vec![]).unwrap().await;
        assert_eq!(name, Ok(Some(Value::String("flint_node_runner_0".to_string()))));

        let echo = registry.run(ECHO_JOB, ctx(), vec![Value::Int32(5)]).unwrap().await;
        assert_eq!(echo, Ok(Some(Value::Int32(5))));

        assert_eq!(registry.run(VOID_JOB, ctx(), vec![]).unwrap().await, Ok(None));

        let error = registry
            .run(ERROR_JOB, ctx(), vec!["boom".into()])
            .unwrap()
            .await
            .unwrap_err();
        assert!(error.starts_with("boom"));

        assert!(registry.run("MISSING", ctx(), vec![]).is_none());
    }

    #[tokio::test]
    async fn test_custom_job() {
        let registry = JobRegistry::new();
        registry.register("ADD", |_ctx, args| async move {
            let sum: i64 = args.iter().filter_map(|v| v.get::<i64>().ok()).sum();
            JobOutcome::Ok(Some(Value::Int64(sum)))
        });

        assert!(registry.contains("ADD"));
        assert!(!registry.contains(NODE_NAME_JOB));
        let sum = registry
            .run("ADD", ctx(), vec![Value::Int64(2), Value::Int64(40)])
            .unwrap()
            .await;
        assert_eq!(sum, Ok(Some(Value::Int64(42))));
    }
}
