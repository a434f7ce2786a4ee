//! Table deployment operations (Imperative Shell).

use super::client;
use super::config::{GsiConfig, KeyAttribute, TableConfig};
use super::error::{DynamodbError, Result};
use super::planning::{DeployPlan, DestroyPlan, GsiStatus, TableStatus};
use aws_sdk_dynamodb::types::{
    AttributeDefinition, BillingMode, CreateGlobalSecondaryIndexAction, GlobalSecondaryIndex,
    GlobalSecondaryIndexUpdate, KeySchemaElement, KeyType, Projection, ProjectionType,
    ScalarAttributeType, TimeToLiveSpecification,
};
use aws_sdk_dynamodb::Client;
use std::time::Duration;

/// Execute a deploy plan.
pub async fn execute_deploy_plan(client: &Client, plan: &DeployPlan) -> Result<()> {
    match plan {
        DeployPlan::CreateTable { config } => {
            create_table(client, config).await?;
            wait_for_table_active(client, &config.table_name).await?;
            if let Some(ttl) = &config.ttl_attribute {
                enable_ttl(client, &config.table_name, ttl).await?;
            }
        }
        DeployPlan::UpdateTable {
            table_name,
            gsis_to_add,
            enable_ttl: ttl,
        } => {
            for gsi in gsis_to_add {
                add_gsi(client, table_name, gsi).await?;
                wait_for_table_active(client, table_name).await?;
            }
            if let Some(ttl) = ttl {
                enable_ttl(client, table_name, ttl).await?;
            }
        }
        DeployPlan::NoChanges { .. } => {}
    }
    Ok(())
}

/// Execute a destroy plan.
pub async fn execute_destroy_plan(client: &Client, plan: &DestroyPlan) -> Result<()> {
    if let DestroyPlan::DeleteTable { table_name } = plan {
        client
            .delete_table()
            .table_name(table_name)
            .send()
            .await
            .map_err(|e| DynamodbError::AwsSdk(e.to_string()))?;
    }
    Ok(())
}

fn key_schema(
    partition_key: &KeyAttribute,
    sort_key: Option<&KeyAttribute>,
) -> Result<Vec<KeySchemaElement>> {
    let mut schema = vec![key_element(partition_key, KeyType::Hash)?];
    if let Some(sk) = sort_key {
        schema.push(key_element(sk, KeyType::Range)?);
    }
    Ok(schema)
}

fn key_element(key: &KeyAttribute, key_type: KeyType) -> Result<KeySchemaElement> {
    KeySchemaElement::builder()
        .attribute_name(&key.name)
        .key_type(key_type)
        .build()
        .map_err(|e| DynamodbError::AwsSdk(e.to_string()))
}

/// String attribute definitions for `keys`, each name defined once.
fn attribute_definitions<'a>(
    keys: impl IntoIterator<Item = &'a KeyAttribute>,
) -> Result<Vec<AttributeDefinition>> {
    let mut definitions: Vec<AttributeDefinition> = Vec::new();
    for key in keys {
        if definitions
            .iter()
            .any(|a| a.attribute_name() == key.name.as_str())
        {
            continue;
        }
        definitions.push(
            AttributeDefinition::builder()
                .attribute_name(&key.name)
                .attribute_type(ScalarAttributeType::S)
                .build()
                .map_err(|e| DynamodbError::AwsSdk(e.to_string()))?,
        );
    }
    Ok(definitions)
}

fn all_attributes() -> Projection {
    Projection::builder()
        .projection_type(ProjectionType::All)
        .build()
}

async fn create_table(client: &Client, config: &TableConfig) -> Result<()> {
    let table_keys = std::iter::once(&config.partition_key).chain(config.sort_key.as_ref());
    let gsi_keys = config
        .gsis
        .iter()
        .flat_map(|gsi| std::iter::once(&gsi.partition_key).chain(gsi.sort_key.as_ref()));

    let mut request = client
        .create_table()
        .table_name(&config.table_name)
        .set_key_schema(Some(key_schema(
            &config.partition_key,
            config.sort_key.as_ref(),
        )?))
        .set_attribute_definitions(Some(attribute_definitions(table_keys.chain(gsi_keys))?))
        .billing_mode(BillingMode::PayPerRequest);

    for gsi in &config.gsis {
        request = request.global_secondary_indexes(
            GlobalSecondaryIndex::builder()
                .index_name(&gsi.name)
                .set_key_schema(Some(key_schema(
                    &gsi.partition_key,
                    gsi.sort_key.as_ref(),
                )?))
                .projection(all_attributes())
                .build()
                .map_err(|e| DynamodbError::AwsSdk(e.to_string()))?,
        );
    }

    request
        .send()
        .await
        .map_err(|e| DynamodbError::AwsSdk(e.to_string()))?;
    Ok(())
}

async fn add_gsi(client: &Client, table_name: &str, gsi: &GsiConfig) -> Result<()> {
    let gsi_keys = std::iter::once(&gsi.partition_key).chain(gsi.sort_key.as_ref());

    client
        .update_table()
        .table_name(table_name)
        .set_attribute_definitions(Some(attribute_definitions(gsi_keys)?))
        .global_secondary_index_updates(
            GlobalSecondaryIndexUpdate::builder()
                .create(
                    CreateGlobalSecondaryIndexAction::builder()
                        .index_name(&gsi.name)
                        .set_key_schema(Some(key_schema(
                            &gsi.partition_key,
                            gsi.sort_key.as_ref(),
                        )?))
                        .projection(all_attributes())
                        .build()
                        .map_err(|e| DynamodbError::AwsSdk(e.to_string()))?,
                )
                .build(),
        )
        .send()
        .await
        .map_err(|e| DynamodbError::AwsSdk(e.to_string()))?;

    Ok(())
}

async fn enable_ttl(client: &Client, table_name: &str, attribute: &str) -> Result<()> {
    client
        .update_time_to_live()
        .table_name(table_name)
        .time_to_live_specification(
            TimeToLiveSpecification::builder()
                .enabled(true)
                .attribute_name(attribute)
                .build()
                .map_err(|e| DynamodbError::AwsSdk(e.to_string()))?,
        )
        .send()
        .await
        .map_err(|e| DynamodbError::AwsSdk(e.to_string()))?;
    Ok(())
}

async fn wait_for_table_active(client: &Client, table_name: &str) -> Result<()> {
    let max_attempts = 60;
    let delay = Duration::from_secs(2);

    for _ in 0..max_attempts {
        if let Some(state) = client::get_table_state(client, table_name).await? {
            let all_gsis_active = state.gsis.iter().all(|g| g.status == GsiStatus::Active);
            if state.status == TableStatus::Active && all_gsis_active {
                return Ok(());
            }
        }
        tokio::time::sleep(delay).await;
    }

    Err(DynamodbError::TableActivationTimeout)
}
