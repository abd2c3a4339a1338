//! Property-based tests for the configuration system.

use super::merger::ConfigMerger;
use super::schema::{Config, OutputFormat, PoolSettings, WorkerSettings};
use super::validator::ConfigValidator;
use proptest::prelude::*;

fn output_format_strategy() -> impl Strategy<Value = OutputFormat> {
    prop_oneof![
        Just(OutputFormat::Table),
        Just(OutputFormat::Json),
        Just(OutputFormat::Csv),
    ]
}

fn pool_strategy() -> impl Strategy<Value = PoolSettings> {
    (
        prop::option::of(1usize..32),
        prop::option::of(1u32..20),
        prop::option::of(1u64..500),
        prop::option::of(500u64..5000),
    )
        .prop_map(|(max_connections, acquire_attempts, initial, max)| PoolSettings {
            max_connections,
            acquire_attempts,
            initial_backoff_ms: initial,
            max_backoff_ms: max,
        })
}

fn config_strategy() -> impl Strategy<Value = Config> {
    (
        prop::option::of(pool_strategy()),
        prop::option::of((prop::option::of(1usize..16), prop::option::of(1usize..256))),
        prop::option::of(output_format_strategy()),
    )
        .prop_map(|(pool, workers, output_format)| Config {
            pool,
            workers: workers.map(|(threads, queue_capacity)| WorkerSettings {
                threads,
                queue_capacity,
            }),
            output_format,
            ..Default::default()
        })
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 2000,
        .. ProptestConfig::default()
    })]

    // Set fields of the higher source win, unset ones keep the lower value
    #[test]
    fn config_merge_higher_precedence_wins(low in config_strategy(), high in config_strategy()) {
        let mut result = low.clone();
        ConfigMerger::merge_into(&mut result, &high);

        let expected_format = high.output_format.or(low.output_format);
        prop_assert_eq!(result.output_format, expected_format);

        let pick = |f: fn(&PoolSettings) -> Option<usize>| {
            high.pool.as_ref().and_then(f).or_else(|| low.pool.as_ref().and_then(f))
        };
        prop_assert_eq!(
            result.pool.as_ref().and_then(|p| p.max_connections),
            pick(|p| p.max_connections)
        );
    }

    // Empty config is identity element for merge
    #[test]
    fn config_merge_identity(config in config_strategy()) {
        let mut merged = config.clone();
        ConfigMerger::merge_into(&mut merged, &Config::default());
        prop_assert_eq!(merged, config);
    }

    // Merging valid configs over the defaults stays valid
    #[test]
    fn valid_configs_stay_valid_after_merge(a in config_strategy(), b in config_strategy()) {
        let mut merged = Config::with_defaults();
        ConfigMerger::merge_into(&mut merged, &a);
        ConfigMerger::merge_into(&mut merged, &b);
        prop_assert!(ConfigValidator::validate(&merged).is_ok());
    }

    // YAML round trip preserves every field
    #[test]
    fn config_yaml_round_trip(config in config_strategy()) {
        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed: Config = serde_yaml::from_str(&yaml).unwrap();
        prop_assert_eq!(parsed, config);
    }
}
