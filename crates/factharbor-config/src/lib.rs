//! Config Resolver (§4.A): merges the built-in defaults, profile defaults,
//! and active UCM-style profile into one typed, validated `ResolvedConfig`.

pub mod defaults;
pub mod resolver;
pub mod schema;

pub use defaults::built_in_defaults;
pub use resolver::*;
pub use schema::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_alone_resolve_cleanly() {
        let resolved = resolve(None, None, None).expect("defaults must typecheck");
        assert_eq!(resolved.pipeline.max_total_iterations, 24);
        assert_eq!(resolved.debate_profile.name, DebateProfileName::Baseline);
        assert!(resolved.fallback_reason.is_none());
    }

    #[test]
    fn active_profile_overrides_defaults() {
        let override_layer = RawConfigLayer {
            max_total_iterations: Some(10),
            debate_profile: Some(DebateProfileName::CrossProvider),
            ..Default::default()
        };
        let resolved = resolve(Some(override_layer), None, None).unwrap();
        assert_eq!(resolved.pipeline.max_total_iterations, 10);
        assert_eq!(resolved.debate_profile.name, DebateProfileName::CrossProvider);
        assert_eq!(resolved.debate_profile.roles.challenger, "openai");
    }

    #[test]
    fn profile_defaults_fill_gaps_between_builtin_and_active() {
        let profile_defaults = RawConfigLayer {
            max_total_iterations: Some(50),
            ..Default::default()
        };
        let active = RawConfigLayer {
            max_iterations_per_scope: Some(2),
            ..Default::default()
        };
        let resolved = resolve(Some(active), Some(profile_defaults), None).unwrap();
        assert_eq!(resolved.pipeline.max_iterations_per_scope, 2);
        assert_eq!(resolved.pipeline.max_total_iterations, 50);
    }

    #[test]
    fn invalid_debate_profile_falls_back_to_last_known_good() {
        let good = resolve(None, None, None).unwrap();
        let mut profiles = std::collections::HashMap::new();
        profiles.insert(
            DebateProfileName::Baseline,
            DebateProfileRoles {
                advocate: "x".into(),
                self_consistency: "x".into(),
                challenger: "x".into(),
                reconciler: "x".into(),
                validation: "x".into(),
            },
        );
        let broken = RawConfigLayer {
            debate_profile: Some(DebateProfileName::TierSplit),
            debate_profiles: Some(profiles),
            ..Default::default()
        };
        let resolved = resolve(Some(broken), None, Some(&good)).unwrap();
        assert!(resolved.fallback_reason.is_some());
        assert_eq!(resolved.debate_profile.name, good.debate_profile.name);
    }
}
