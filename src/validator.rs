//! Per-observation quality rules.
//!
//! Four independent checks; the verdict is the union of every rule that
//! fires. Validation is a pure function of the observation, the thresholds
//! and the reference time, so the same inputs always give the same verdict.

use crate::config::Thresholds;
use crate::model::{Observation, RuleTag, ValidationVerdict};
use chrono::{DateTime, Duration, Utc};

pub struct Validator {
    thresholds: Thresholds,
    now: DateTime<Utc>,
}

impl Validator {
    /// `now` is the run's reference time for the freshness rule.
    pub fn new(thresholds: Thresholds, now: DateTime<Utc>) -> Self {
        Self { thresholds, now }
    }

    pub fn validate(&self, obs: &Observation) -> ValidationVerdict {
        let mut verdict = ValidationVerdict::default();
        self.check_missing(obs, &mut verdict);
        self.check_temperature(obs, &mut verdict);
        self.check_energy(obs, &mut verdict);
        self.check_freshness(obs, &mut verdict);
        verdict
    }

    fn check_missing(&self, obs: &Observation, verdict: &mut ValidationVerdict) {
        let missing: Vec<&str> = [
            ("temp_max_f", obs.temp_max_f),
            ("temp_min_f", obs.temp_min_f),
            ("energy_mwh", obs.energy_mwh),
        ]
        .into_iter()
        .filter(|(_, v)| v.is_none())
        .map(|(name, _)| name)
        .collect();

        if !missing.is_empty() {
            verdict.flag(
                RuleTag::MissingValues,
                format!("missing {}", missing.join(", ")),
            );
        }
    }

    fn check_temperature(&self, obs: &Observation, verdict: &mut ValidationVerdict) {
        let (lo, hi) = (self.thresholds.outlier_min_f, self.thresholds.outlier_max_f);
        let out_of_range: Vec<String> = [("temp_max_f", obs.temp_max_f), ("temp_min_f", obs.temp_min_f)]
            .into_iter()
            .filter_map(|(name, v)| v.map(|v| (name, v)))
            .filter(|(_, v)| *v > hi || *v < lo)
            .map(|(name, v)| format!("{name}={v}"))
            .collect();

        if !out_of_range.is_empty() {
            verdict.flag(
                RuleTag::TemperatureOutliers,
                format!("{} outside [{lo}, {hi}] °F", out_of_range.join(", ")),
            );
        }
    }

    fn check_energy(&self, obs: &Observation, verdict: &mut ValidationVerdict) {
        match obs.energy_mwh {
            None => verdict.flag(RuleTag::NegativeOrMissingEnergy, "energy_mwh is missing"),
            Some(v) if v < 0.0 => verdict.flag(
                RuleTag::NegativeOrMissingEnergy,
                format!("energy_mwh is negative ({v})"),
            ),
            Some(_) => {}
        }
    }

    fn check_freshness(&self, obs: &Observation, verdict: &mut ValidationVerdict) {
        // Limits too large to represent never expire.
        let limit = Duration::try_days(self.thresholds.freshness_days);
        match obs.fetched_at {
            None => verdict.flag(RuleTag::StaleRecords, "retrieval time unknown"),
            Some(fetched) => {
                let age = self.now - fetched;
                if limit.is_some_and(|limit| age > limit) {
                    verdict.flag(
                        RuleTag::StaleRecords,
                        format!(
                            "fetched {}h ago, limit {}d",
                            age.num_hours(),
                            self.thresholds.freshness_days
                        ),
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 7, 10, 12, 0, 0).unwrap()
    }

    fn validator() -> Validator {
        Validator::new(Thresholds::default(), now())
    }

    fn clean() -> Observation {
        Observation {
            date: "2024-07-09".parse().unwrap(),
            city_id: "phoenix".into(),
            temp_max_f: Some(108.0),
            temp_min_f: Some(84.0),
            energy_mwh: Some(61000.0),
            fetched_at: Some(now() - Duration::hours(3)),
        }
    }

    #[test]
    fn test_clean_observation_has_empty_verdict() {
        assert!(validator().validate(&clean()).is_clean());
    }

    #[test]
    fn test_each_missing_field_flags_missing_values() {
        for field in 0..3 {
            let mut o = clean();
            match field {
                0 => o.temp_max_f = None,
                1 => o.temp_min_f = None,
                _ => o.energy_mwh = None,
            }
            let v = validator().validate(&o);
            assert!(v.has(RuleTag::MissingValues), "field {field}");
        }
    }

    #[test]
    fn test_missing_temperature_does_not_flag_energy() {
        let mut o = clean();
        o.temp_min_f = None;
        let v = validator().validate(&o);
        assert_eq!(v.tags().collect::<Vec<_>>(), vec![RuleTag::MissingValues]);
        assert_eq!(v.note(RuleTag::MissingValues), Some("missing temp_min_f"));
    }

    #[test]
    fn test_temperature_bounds() {
        let mut hot = clean();
        hot.temp_max_f = Some(130.1);
        assert!(validator().validate(&hot).has(RuleTag::TemperatureOutliers));

        let mut cold = clean();
        cold.temp_max_f = Some(-10.0);
        cold.temp_min_f = Some(-50.5);
        assert!(validator().validate(&cold).has(RuleTag::TemperatureOutliers));

        let mut edge = clean();
        edge.temp_max_f = Some(130.0);
        edge.temp_min_f = Some(-50.0);
        assert!(!validator().validate(&edge).has(RuleTag::TemperatureOutliers));
    }

    #[test]
    fn test_either_temperature_outside_range_is_outlier() {
        let mut o = clean();
        o.temp_max_f = Some(-60.0);
        o.temp_min_f = Some(-70.0);
        assert!(validator().validate(&o).has(RuleTag::TemperatureOutliers));
    }

    #[test]
    fn test_negative_and_missing_energy() {
        let mut neg = clean();
        neg.energy_mwh = Some(-0.5);
        let v = validator().validate(&neg);
        assert!(v.has(RuleTag::NegativeOrMissingEnergy));
        assert!(!v.has(RuleTag::MissingValues));

        let mut absent = clean();
        absent.energy_mwh = None;
        let v = validator().validate(&absent);
        assert!(v.has(RuleTag::NegativeOrMissingEnergy));
        assert!(v.has(RuleTag::MissingValues));

        let mut zero = clean();
        zero.energy_mwh = Some(0.0);
        assert!(validator().validate(&zero).is_clean());
    }

    #[test]
    fn test_freshness_uses_fetch_time_not_date() {
        let mut old_date = clean();
        old_date.date = "2020-01-01".parse().unwrap();
        assert!(!validator().validate(&old_date).has(RuleTag::StaleRecords));

        let mut old_fetch = clean();
        old_fetch.fetched_at = Some(now() - Duration::days(2) - Duration::seconds(1));
        assert!(validator().validate(&old_fetch).has(RuleTag::StaleRecords));

        let mut exactly_two_days = clean();
        exactly_two_days.fetched_at = Some(now() - Duration::days(2));
        assert!(!validator().validate(&exactly_two_days).has(RuleTag::StaleRecords));
    }

    #[test]
    fn test_unrepresentable_freshness_limit_does_not_panic() {
        let t = Thresholds {
            freshness_days: 200_000_000_000_000,
            ..Default::default()
        };
        let mut o = clean();
        o.fetched_at = Some(now() - Duration::days(400));
        let v = Validator::new(t, now()).validate(&o);
        assert!(!v.has(RuleTag::StaleRecords));
    }

    #[test]
    fn test_unknown_fetch_time_is_stale() {
        let mut o = clean();
        o.fetched_at = None;
        assert!(validator().validate(&o).has(RuleTag::StaleRecords));
    }

    #[test]
    fn test_rules_do_not_short_circuit() {
        let o = Observation {
            temp_max_f: Some(140.0),
            temp_min_f: None,
            energy_mwh: Some(-3.0),
            fetched_at: Some(now() - Duration::days(5)),
            ..clean()
        };
        let v = validator().validate(&o);
        assert_eq!(v.tags().count(), 4);
    }

    #[test]
    fn test_validation_is_idempotent() {
        let mut o = clean();
        o.temp_max_f = Some(135.0);
        o.energy_mwh = None;
        let v = validator();
        assert_eq!(v.validate(&o), v.validate(&o));
    }

    #[test]
    fn test_custom_thresholds() {
        let t = Thresholds {
            outlier_max_f: 100.0,
            outlier_min_f: 0.0,
            freshness_days: 0,
        };
        let v = Validator::new(t, now()).validate(&clean());
        assert!(v.has(RuleTag::TemperatureOutliers));
        assert!(v.has(RuleTag::StaleRecords));
    }
}
