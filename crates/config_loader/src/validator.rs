//! 配置校验模块
//!
//! 字段级规则由 `validator` derive 完成，跨字段规则在此手写：
//! - 适配器名称唯一
//! - hard_capacity >= soft_capacity
//! - 发布目标必需参数

use std::collections::HashSet;

use contracts::{ContractError, GatewayConfig, PublisherType};
use validator::{Validate, ValidationErrors, ValidationErrorsKind};

/// 校验完整配置
pub fn validate(config: &GatewayConfig) -> Result<(), ContractError> {
    validate_fields(config)?;
    validate_queue(config)?;
    validate_adapters(config)?;
    validate_publisher(config)?;
    Ok(())
}

/// 执行 derive 规则，并将第一个违规转换为 ContractError
fn validate_fields(config: &GatewayConfig) -> Result<(), ContractError> {
    match config.validate() {
        Ok(()) => Ok(()),
        Err(errors) => {
            let (field, message) = first_violation("", &errors)
                .unwrap_or_else(|| ("<root>".to_string(), errors.to_string()));
            Err(ContractError::config_validation(field, message))
        }
    }
}

/// Walk nested errors in a stable (sorted) order
fn first_violation(prefix: &str, errors: &ValidationErrors) -> Option<(String, String)> {
    let mut fields: Vec<_> = errors.errors().iter().collect();
    fields.sort_by(|a, b| a.0.cmp(b.0));

    for (field, kind) in fields {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{prefix}.{field}")
        };

        match kind {
            ValidationErrorsKind::Field(list) => {
                if let Some(err) = list.first() {
                    let message = match &err.message {
                        Some(m) => m.to_string(),
                        None => format!("failed '{}' check", err.code),
                    };
                    return Some((path, message));
                }
            }
            ValidationErrorsKind::Struct(inner) => {
                if let Some(found) = first_violation(&path, inner) {
                    return Some(found);
                }
            }
            ValidationErrorsKind::List(items) => {
                for (idx, inner) in items {
                    if let Some(found) = first_violation(&format!("{path}[{idx}]"), inner) {
                        return Some(found);
                    }
                }
            }
        }
    }
    None
}

/// 校验队列容量
fn validate_queue(config: &GatewayConfig) -> Result<(), ContractError> {
    if let Some(hard) = config.queue.hard_capacity {
        if hard < config.queue.soft_capacity {
            return Err(ContractError::config_validation(
                "queue.hard_capacity",
                format!(
                    "hard_capacity ({}) must be >= soft_capacity ({})",
                    hard, config.queue.soft_capacity
                ),
            ));
        }
    }
    Ok(())
}

/// 校验适配器名称唯一
fn validate_adapters(config: &GatewayConfig) -> Result<(), ContractError> {
    let mut names = HashSet::new();
    for (idx, adapter) in config.adapters.iter().enumerate() {
        if !names.insert(adapter.name.as_str()) {
            return Err(ContractError::config_validation(
                format!("adapters[{}].name", idx),
                format!("duplicate adapter name '{}'", adapter.name),
            ));
        }
    }
    Ok(())
}

/// 校验发布目标参数
fn validate_publisher(config: &GatewayConfig) -> Result<(), ContractError> {
    let publisher = &config.publisher;
    let required = match publisher.publisher_type {
        PublisherType::Log => None,
        PublisherType::File => Some("path"),
        PublisherType::Network => Some("addr"),
    };

    if let Some(key) = required {
        let present = publisher
            .params
            .get(key)
            .is_some_and(|v| !v.trim().is_empty());
        if !present {
            return Err(ContractError::config_validation(
                format!("publisher.params.{key}"),
                format!(
                    "{:?} publisher '{}' requires '{}'",
                    publisher.publisher_type, publisher.name, key
                ),
            ));
        }
    }
    Ok(())
}
