//! Assembling a [`plan::Request`] from the files named on the command
//! line. Plan JSON parsing is nominally out of scope for the core
//! (`spec.md` §1) but `plan::Plan` already derives `Deserialize`
//! precisely so a thin driver like this one can hand the file to
//! `serde_json` and trust its rejection of malformed input, per §6.3's
//! "the core trusts the parser to reject malformed plans."

use std::path::Path;

use plan::{ParamOverrides, Plan, Request, UserId};
use snafu::ResultExt;

use crate::config::Config;
use crate::error::{
    InvalidUserIdSnafu, ParseParamOverridesFileSnafu, ParsePlanFileSnafu, ReadParamOverridesFileSnafu,
    ReadPlanFileSnafu, Result,
};

fn load_plan(path: &Path) -> Result<Plan> {
    let text = std::fs::read_to_string(path).context(ReadPlanFileSnafu { path: path.to_path_buf() })?;
    serde_json::from_str(&text).context(ParsePlanFileSnafu { path: path.to_path_buf() })
}

fn load_param_overrides(path: &Path) -> Result<ParamOverrides> {
    let text =
        std::fs::read_to_string(path).context(ReadParamOverridesFileSnafu { path: path.to_path_buf() })?;
    serde_json::from_str(&text).context(ParseParamOverridesFileSnafu { path: path.to_path_buf() })
}

/// Build the request envelope described by §6.1 from `config`.
pub fn build(config: &Config) -> Result<Request> {
    let plan = load_plan(&config.plan)?;

    let param_overrides = match &config.param_overrides {
        Some(path) => load_param_overrides(path)?,
        None => ParamOverrides::default(),
    };

    let user_id = UserId::parse(&config.user_id).context(InvalidUserIdSnafu {
        raw: config.user_id.clone(),
    })?;

    let request_id = config
        .request_id
        .clone()
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    Ok(Request {
        plan,
        param_overrides,
        user_id,
        request_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SchedulerKind;
    use std::io::Write;

    fn base_config(plan_path: std::path::PathBuf) -> Config {
        Config {
            plan: plan_path,
            endpoints: None,
            param_overrides: None,
            user_id: "7".into(),
            request_id: None,
            deadline_ms: None,
            scheduler: SchedulerKind::Async,
            cpu_threads: None,
            max_nodes_inflight: dag_scheduler::DEFAULT_MAX_NODES_INFLIGHT,
            verbose: false,
        }
    }

    #[test]
    fn builds_request_from_minimal_plan_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"schema_version": 1, "plan_name": "p", "nodes": [], "outputs": []}}"#
        )
        .unwrap();

        let config = base_config(file.path().to_path_buf());
        let request = build(&config).unwrap();
        assert_eq!(request.plan.plan_name, "p");
        assert_eq!(request.user_id.get(), 7);
        assert!(!request.request_id.is_empty());
    }

    #[test]
    fn rejects_invalid_user_id() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"schema_version": 1, "plan_name": "p", "nodes": [], "outputs": []}}"#
        )
        .unwrap();

        let mut config = base_config(file.path().to_path_buf());
        config.user_id = "-1".into();
        let err = build(&config).unwrap_err();
        assert!(matches!(err, crate::error::Error::InvalidUserId { .. }));
    }
}
