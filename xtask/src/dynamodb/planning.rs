//! Pure functions for calculating deployment plans (Functional Core).

use super::config::{GsiConfig, TableConfig};

/// Represents the current state of a table.
#[derive(Debug, Clone)]
pub struct TableState {
    pub status: TableStatus,
    pub gsis: Vec<GsiState>,
    /// Attribute TTL is enabled on, if any.
    pub ttl_attribute: Option<String>,
}

/// Table status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableStatus {
    Active,
    Creating,
    Updating,
    Deleting,
}

/// GSI state.
#[derive(Debug, Clone)]
pub struct GsiState {
    pub name: String,
    pub status: GsiStatus,
}

/// GSI status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GsiStatus {
    Active,
    Creating,
    Updating,
    Deleting,
}

/// Planned changes for deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeployPlan {
    /// Table doesn't exist, needs to be created (TTL enabled afterwards).
    CreateTable { config: TableConfig },
    /// Table exists but is missing GSIs or TTL.
    UpdateTable {
        table_name: String,
        gsis_to_add: Vec<GsiConfig>,
        enable_ttl: Option<String>,
    },
    /// Table is up to date, no changes needed.
    NoChanges { table_name: String },
}

/// Plan for destroying a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DestroyPlan {
    /// Table exists and will be deleted.
    DeleteTable { table_name: String },
    /// Table doesn't exist, nothing to do.
    AlreadyGone { table_name: String },
}

/// Pure function: Calculate what changes are needed to reach desired state.
pub fn calculate_deploy_plan(current: Option<&TableState>, desired: &TableConfig) -> DeployPlan {
    let Some(state) = current else {
        return DeployPlan::CreateTable {
            config: desired.clone(),
        };
    };

    let existing_gsi_names: Vec<&str> = state.gsis.iter().map(|g| g.name.as_str()).collect();

    let gsis_to_add: Vec<GsiConfig> = desired
        .gsis
        .iter()
        .filter(|gsi| !existing_gsi_names.contains(&gsi.name.as_str()))
        .cloned()
        .collect();

    let enable_ttl = desired
        .ttl_attribute
        .clone()
        .filter(|attribute| state.ttl_attribute.as_ref() != Some(attribute));

    if gsis_to_add.is_empty() && enable_ttl.is_none() {
        DeployPlan::NoChanges {
            table_name: desired.table_name.clone(),
        }
    } else {
        DeployPlan::UpdateTable {
            table_name: desired.table_name.clone(),
            gsis_to_add,
            enable_ttl,
        }
    }
}

/// Pure function: Calculate destroy plan.
pub fn calculate_destroy_plan(current: Option<&TableState>, table_name: &str) -> DestroyPlan {
    match current {
        Some(_) => DestroyPlan::DeleteTable {
            table_name: table_name.to_string(),
        },
        None => DestroyPlan::AlreadyGone {
            table_name: table_name.to_string(),
        },
    }
}

/// Pure function: Format a deploy plan for display.
pub fn format_deploy_plan(plan: &DeployPlan) -> Vec<String> {
    match plan {
        DeployPlan::CreateTable { config } => {
            let mut lines = vec![
                format!("+ Create table: {}", config.table_name),
                format!("  Partition key: {} (S)", config.partition_key.name),
            ];
            if let Some(sk) = &config.sort_key {
                lines.push(format!("  Sort key: {} (S)", sk.name));
            }
            for gsi in &config.gsis {
                lines.push(format!("  + GSI: {}", gsi.name));
                lines.push(format!("    Partition key: {} (S)", gsi.partition_key.name));
                if let Some(sk) = &gsi.sort_key {
                    lines.push(format!("    Sort key: {} (S)", sk.name));
                }
            }
            if let Some(ttl) = &config.ttl_attribute {
                lines.push(format!("  + TTL on: {ttl}"));
            }
            lines.push("  Billing: PAY_PER_REQUEST".to_string());
            lines
        }
        DeployPlan::UpdateTable {
            table_name,
            gsis_to_add,
            enable_ttl,
        } => {
            let mut lines = vec![format!("~ Update table: {}", table_name)];
            for gsi in gsis_to_add {
                lines.push(format!("  + Add GSI: {}", gsi.name));
            }
            if let Some(ttl) = enable_ttl {
                lines.push(format!("  + Enable TTL on: {ttl}"));
            }
            lines
        }
        DeployPlan::NoChanges { table_name } => {
            vec![format!("= Table '{}' is up to date", table_name)]
        }
    }
}

/// Pure function: Format a destroy plan for display.
pub fn format_destroy_plan(plan: &DestroyPlan) -> Vec<String> {
    match plan {
        DestroyPlan::DeleteTable { table_name } => {
            vec![format!(
                "- Delete table: {} (ALL DATA WILL BE LOST)",
                table_name
            )]
        }
        DestroyPlan::AlreadyGone { table_name } => {
            vec![format!("= Table '{}' does not exist", table_name)]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dynamodb::config::tutorcall_table_config;

    fn active_state(gsis: &[&str], ttl_attribute: Option<&str>) -> TableState {
        TableState {
            status: TableStatus::Active,
            gsis: gsis
                .iter()
                .map(|name| GsiState {
                    name: name.to_string(),
                    status: GsiStatus::Active,
                })
                .collect(),
            ttl_attribute: ttl_attribute.map(str::to_string),
        }
    }

    #[test]
    fn test_missing_table_is_created() {
        let plan = calculate_deploy_plan(None, &tutorcall_table_config());

        assert!(matches!(plan, DeployPlan::CreateTable { .. }));
        let lines = format_deploy_plan(&plan);
        assert_eq!(lines[0], "+ Create table: tutorcall");
        assert!(lines.contains(&"  + TTL on: expiresAt".to_string()));
    }

    #[test]
    fn test_complete_table_needs_no_changes() {
        let state = active_state(&["GSI1"], Some("expiresAt"));

        let plan = calculate_deploy_plan(Some(&state), &tutorcall_table_config());

        assert_eq!(
            plan,
            DeployPlan::NoChanges {
                table_name: "tutorcall".to_string()
            }
        );
    }

    #[test]
    fn test_missing_ttl_is_enabled() {
        let state = active_state(&["GSI1"], None);

        let plan = calculate_deploy_plan(Some(&state), &tutorcall_table_config());

        assert_eq!(
            plan,
            DeployPlan::UpdateTable {
                table_name: "tutorcall".to_string(),
                gsis_to_add: vec![],
                enable_ttl: Some("expiresAt".to_string()),
            }
        );
    }

    #[test]
    fn test_missing_gsi_is_added() {
        let state = active_state(&[], Some("expiresAt"));

        let plan = calculate_deploy_plan(Some(&state), &tutorcall_table_config());

        match plan {
            DeployPlan::UpdateTable {
                gsis_to_add,
                enable_ttl,
                ..
            } => {
                assert_eq!(gsis_to_add.len(), 1);
                assert_eq!(gsis_to_add[0].name, "GSI1");
                assert_eq!(enable_ttl, None);
            }
            other => panic!("unexpected plan: {other:?}"),
        }
    }

    #[test]
    fn test_destroy_plan() {
        let state = active_state(&["GSI1"], None);

        assert_eq!(
            calculate_destroy_plan(Some(&state), "tutorcall"),
            DestroyPlan::DeleteTable {
                table_name: "tutorcall".to_string()
            }
        );
        assert_eq!(
            format_destroy_plan(&calculate_destroy_plan(None, "tutorcall")),
            vec!["= Table 'tutorcall' does not exist".to_string()]
        );
    }
}
