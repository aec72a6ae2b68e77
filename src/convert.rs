//! Pure conversion functions: TOML config structs -> crate API config types.

use anyhow::{Result, bail};

use nimbus_markov::{
    ConditionClassifier, KeywordRule, MarkovConfig, SimulationRequest, StateOrder,
    SteadyStateFallback,
};

use crate::config::*;

/// Parses a steady-state fallback policy name.
pub fn parse_fallback(s: &str) -> Result<SteadyStateFallback> {
    match s.to_lowercase().as_str() {
        "error" => Ok(SteadyStateFallback::Error),
        "last_iterate" | "last-iterate" => Ok(SteadyStateFallback::LastIterate),
        "uniform" => Ok(SteadyStateFallback::Uniform),
        other => bail!("unknown steady-state fallback: {other:?}"),
    }
}

/// Parses a state ordering policy name.
pub fn parse_state_order(s: &str) -> Result<StateOrder> {
    match s.to_lowercase().as_str() {
        "first_seen" | "first-seen" => Ok(StateOrder::FirstSeen),
        "declared" => Ok(StateOrder::Declared),
        other => bail!("unknown state order: {other:?}"),
    }
}

/// Builds a [`ConditionClassifier`] from the TOML classifier section.
pub fn build_classifier(classifier: &ClassifierToml) -> Result<ConditionClassifier> {
    let cls = classifier
        .rules
        .iter()
        .fold(ConditionClassifier::new(&classifier.default_state), |c, r| {
            c.with_rule(KeywordRule::new(&r.keyword, &r.state))
        });
    cls.validate()?;
    Ok(cls)
}

/// Builds a [`MarkovConfig`] from the solver, simulation and I/O sections.
pub fn build_markov_config(config: &NimbusConfig) -> Result<MarkovConfig> {
    let cfg = MarkovConfig::new()
        .with_tolerance(config.steady_state.tolerance)
        .with_max_iterations(config.steady_state.max_iterations)
        .with_fallback(parse_fallback(&config.steady_state.fallback)?)
        .with_max_days(config.simulation.max_days)
        .with_state_order(parse_state_order(&config.classifier.state_order)?)
        .with_allow_date_gaps(config.io.allow_date_gaps);
    cfg.validate()?;
    Ok(cfg)
}

/// Builds a [`SimulationRequest`] from the TOML simulation section.
pub fn build_request(sim: &SimulationToml) -> Result<SimulationRequest> {
    let Some(ref initial) = sim.initial_state else {
        bail!("no initial state: set [simulation].initial_state in config or use --initial-state");
    };
    let mut req = SimulationRequest::new(sim.days, initial);
    if let Some(s) = sim.seed {
        req = req.with_seed(s);
    }
    if let Some(t) = sim.start_ms {
        req = req.with_start_ms(t);
    }
    Ok(req)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_names() {
        assert_eq!(parse_fallback("Error").unwrap(), SteadyStateFallback::Error);
        assert_eq!(
            parse_fallback("last-iterate").unwrap(),
            SteadyStateFallback::LastIterate
        );
        assert_eq!(parse_fallback("uniform").unwrap(), SteadyStateFallback::Uniform);
        assert!(parse_fallback("zero").is_err());
    }

    #[test]
    fn state_order_names() {
        assert_eq!(parse_state_order("first_seen").unwrap(), StateOrder::FirstSeen);
        assert_eq!(parse_state_order("DECLARED").unwrap(), StateOrder::Declared);
        assert!(parse_state_order("alphabetical").is_err());
    }

    #[test]
    fn default_classifier_matches_library() {
        let cls = build_classifier(&ClassifierToml::default()).unwrap();
        assert_eq!(cls, ConditionClassifier::default());
    }

    #[test]
    fn markov_config_from_toml() {
        let mut cfg = NimbusConfig::default();
        cfg.steady_state.max_iterations = 50;
        cfg.steady_state.fallback = "uniform".to_string();
        cfg.classifier.state_order = "declared".to_string();
        let mc = build_markov_config(&cfg).unwrap();
        assert_eq!(mc.max_iterations(), 50);
        assert_eq!(mc.fallback(), SteadyStateFallback::Uniform);
        assert_eq!(mc.state_order(), StateOrder::Declared);
        assert_eq!(mc.max_days(), 365);
    }

    #[test]
    fn invalid_tolerance_rejected() {
        let mut cfg = NimbusConfig::default();
        cfg.steady_state.tolerance = 0.0;
        assert!(build_markov_config(&cfg).is_err());
    }

    #[test]
    fn request_requires_initial_state() {
        let mut sim = SimulationToml::default();
        let err = build_request(&sim).unwrap_err();
        assert!(err.to_string().contains("--initial-state"));

        sim.initial_state = Some("Rainy".to_string());
        sim.seed = Some(3);
        let req = build_request(&sim).unwrap();
        assert_eq!(req.days, 7);
        assert_eq!(req.initial_state, "Rainy");
        assert_eq!(req.seed, Some(3));
        assert_eq!(req.start_ms, None);
    }
}
