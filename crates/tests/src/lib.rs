//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 场景测试 (已知传感器、未知 key、未知传感器、类型错误、恢复)
//! - 性质测试 (完整性、幂等强转、告警去重、快照原子性)
//! - 刷新合并与陈旧快照

#[cfg(test)]
mod fixtures;
#[cfg(test)]
mod properties;
#[cfg(test)]
mod scenarios;

#[cfg(test)]
mod contract_tests {
    #[test]
    fn test_contracts_compile() {
        let _ = contracts::ConfigVersion::V1;
    }

    #[test]
    fn test_example_config_loads() {
        let content = r#"
[metadata]
path = "metadata.json"

[router]
max_in_flight = 8

[storage]
name = "warehouse"
kind = "file"
params = { base_path = "./out" }

[publisher]
name = "socket"
kind = "network"
params = { addr = "127.0.0.1:9100", format = "json" }

[alerts]
name = "apiary"
kind = "log"
"#;
        let blueprint =
            config_loader::ConfigLoader::load_from_str(content, config_loader::ConfigFormat::Toml)
                .unwrap();
        assert_eq!(blueprint.router.max_in_flight, 8);
        assert_eq!(blueprint.publisher.params["format"], "json");
    }
}
