pub mod config_cmd;
pub mod modes;
pub mod run;

use taskloom_config::Settings;

/// Layer `--set key=value` assignments over `base`.
pub fn apply_assignments(base: Settings, assignments: &[String]) -> anyhow::Result<Settings> {
    let mut settings = base;
    for assignment in assignments {
        let (key, value) = Settings::parse_assignment(assignment)?;
        settings.insert(key, value);
    }
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assignments_override_base() {
        let base = Settings::new().with("max_steps", 5u32).with("model", "a");
        let settings = apply_assignments(
            base,
            &["max_steps=9".to_string(), "tools.shell=true".to_string()],
        )
        .unwrap();
        assert_eq!(settings.get_u32("max_steps").unwrap(), Some(9));
        assert_eq!(settings.get_bool("tools.shell").unwrap(), Some(true));
        assert_eq!(settings.get_str("model").as_deref(), Some("a"));
    }

    #[test]
    fn malformed_assignment_fails() {
        assert!(apply_assignments(Settings::new(), &["max_steps".to_string()]).is_err());
    }
}
