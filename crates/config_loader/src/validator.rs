//! 配置校验模块
//!
//! 校验规则：
//! - 字段级约束 (`validator` derive)
//! - output 名称非空且唯一
//! - storage 不能是 network
//! - file 需要 base_path，network 需要合法的 addr

use std::collections::HashSet;
use std::net::SocketAddr;

use contracts::{ContractError, MapperBlueprint, OutputConfig, OutputKind};
use validator::Validate;

/// 校验 MapperBlueprint 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(blueprint: &MapperBlueprint) -> Result<(), ContractError> {
    blueprint
        .validate()
        .map_err(|e| ContractError::config_validation("blueprint", e.to_string()))?;
    validate_output_names(blueprint)?;
    validate_storage_kind(blueprint)?;
    for (role, output) in blueprint.outputs() {
        validate_output_params(role, output)?;
    }
    Ok(())
}

/// 校验 output 名称唯一性
fn validate_output_names(blueprint: &MapperBlueprint) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for (role, output) in blueprint.outputs() {
        if output.name.trim().is_empty() {
            return Err(ContractError::config_validation(
                format!("{role}.name"),
                "output name cannot be empty",
            ));
        }
        if !seen.insert(output.name.as_str()) {
            return Err(ContractError::config_validation(
                format!("{role}.name"),
                format!("duplicate output name '{}'", output.name),
            ));
        }
    }
    Ok(())
}

/// 表写入不支持 UDP
fn validate_storage_kind(blueprint: &MapperBlueprint) -> Result<(), ContractError> {
    if blueprint.storage.kind == OutputKind::Network {
        return Err(ContractError::config_validation(
            "storage.kind",
            "network output cannot store feature or misfit rows",
        ));
    }
    Ok(())
}

fn validate_output_params(role: &str, output: &OutputConfig) -> Result<(), ContractError> {
    match output.kind {
        OutputKind::File => {
            let base_path = output.params.get("base_path").map(String::as_str);
            if base_path.is_none_or(|p| p.trim().is_empty()) {
                return Err(ContractError::config_validation(
                    format!("{role}.params.base_path"),
                    "file output requires 'base_path'",
                ));
            }
        }
        OutputKind::Network => {
            let Some(addr) = output.params.get("addr") else {
                return Err(ContractError::config_validation(
                    format!("{role}.params.addr"),
                    "network output requires 'addr'",
                ));
            };
            if let Err(e) = addr.parse::<SocketAddr>() {
                return Err(ContractError::config_validation(
                    format!("{role}.params.addr"),
                    format!("invalid address '{addr}': {e}"),
                ));
            }
        }
        OutputKind::Log | OutputKind::Memory => {}
    }
    Ok(())
}
