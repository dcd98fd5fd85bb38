mod common;

use anyhow::Result;
use common::{TestServer, TENANT_HEADER};
use reqwest::{header, StatusCode};
use serde_json::Value;
use uuid::Uuid;

#[tokio::test]
async fn tenant_only_sees_its_own_records() -> Result<()> {
    let (server, _) = TestServer::with_memory_store().await?;
    let tenant_a = Uuid::new_v4().to_string();
    let tenant_b = Uuid::new_v4().to_string();

    let res = server.create_record(Some(&tenant_a), "a1").await?;
    assert_eq!(res.status(), StatusCode::CREATED);

    let res = server.list_records(Some(&tenant_a)).await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await?;
    let records = body["data"].as_array().expect("data array");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["value"], "a1");
    assert_eq!(records[0]["tenantId"], tenant_a.as_str());

    let res = server.list_records(Some(&tenant_b)).await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await?;
    assert_eq!(body["data"].as_array().map(Vec::len), Some(0));
    Ok(())
}

#[tokio::test]
async fn records_are_listed_newest_first() -> Result<()> {
    let (server, _) = TestServer::with_memory_store().await?;
    let tenant = Uuid::new_v4().to_string();

    for value in ["first", "second", "third"] {
        let res = server.create_record(Some(&tenant), value).await?;
        assert_eq!(res.status(), StatusCode::CREATED);
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }

    let body: Value = server.list_records(Some(&tenant)).await?.json().await?;
    let values: Vec<&str> = body["data"]
        .as_array()
        .expect("data array")
        .iter()
        .filter_map(|r| r["value"].as_str())
        .collect();
    assert_eq!(values, vec!["third", "second", "first"]);
    Ok(())
}

#[tokio::test]
async fn create_without_tenant_is_rejected_and_nothing_is_stored() -> Result<()> {
    let (server, store) = TestServer::with_memory_store().await?;

    let res = server.create_record(None, "orphan").await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await?;
    assert_eq!(body["error"], true);
    assert_eq!(body["message"], "Tenant context is required.");

    assert!(store.rows().await.is_empty());
    Ok(())
}

#[tokio::test]
async fn list_without_tenant_is_rejected() -> Result<()> {
    let (server, _) = TestServer::with_memory_store().await?;

    let res = server.list_records(None).await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn nil_uuid_header_counts_as_no_tenant() -> Result<()> {
    let (server, store) = TestServer::with_memory_store().await?;
    let nil = Uuid::nil().to_string();

    assert_eq!(server.create_record(Some(&nil), "x").await?.status(), StatusCode::BAD_REQUEST);
    assert_eq!(server.list_records(Some(&nil)).await?.status(), StatusCode::BAD_REQUEST);
    assert!(store.rows().await.is_empty());
    Ok(())
}

#[tokio::test]
async fn malformed_header_counts_as_no_tenant() -> Result<()> {
    let (server, _) = TestServer::with_memory_store().await?;

    let res = server.create_record(Some("not-a-uuid"), "x").await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn header_value_is_trimmed() -> Result<()> {
    let (server, store) = TestServer::with_memory_store().await?;
    let tenant = Uuid::new_v4();

    let res = server.create_record(Some(&format!("  {}  ", tenant)), "padded").await?;
    assert_eq!(res.status(), StatusCode::CREATED);
    assert_eq!(store.rows().await[0].tenant_id, tenant);
    Ok(())
}

#[tokio::test]
async fn create_returns_id_and_location() -> Result<()> {
    let (server, store) = TestServer::with_memory_store().await?;
    let tenant = Uuid::new_v4();

    let res = server.create_record(Some(&tenant.to_string()), "a1").await?;
    assert_eq!(res.status(), StatusCode::CREATED);
    let location = res
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let body: Value = res.json().await?;

    let rows = store.rows().await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].tenant_id, tenant);
    assert_eq!(body["data"]["id"], rows[0].id.to_string());
    assert_eq!(location, Some(format!("/api/sample/records/{}", rows[0].id)));
    Ok(())
}

#[tokio::test]
async fn overlong_value_is_rejected() -> Result<()> {
    let (server, store) = TestServer::with_memory_store().await?;
    let tenant = Uuid::new_v4().to_string();

    let res = server.create_record(Some(&tenant), &"x".repeat(501)).await?;
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = res.json().await?;
    assert!(body["field_errors"]["value"].is_string());
    assert!(store.rows().await.is_empty());

    let res = server.create_record(Some(&tenant), &"x".repeat(500)).await?;
    assert_eq!(res.status(), StatusCode::CREATED);
    Ok(())
}

#[tokio::test]
async fn null_value_is_accepted() -> Result<()> {
    let (server, store) = TestServer::with_memory_store().await?;
    let tenant = Uuid::new_v4().to_string();

    let res = server
        .client
        .post(server.url("/api/sample/records"))
        .header(TENANT_HEADER, tenant.as_str())
        .json(&serde_json::json!({}))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::CREATED);
    assert_eq!(store.rows().await[0].value, None);
    Ok(())
}

#[tokio::test]
async fn concurrent_tenants_do_not_leak() -> Result<()> {
    let (server, _) = TestServer::with_memory_store().await?;
    let tenants: Vec<String> = (0..4).map(|_| Uuid::new_v4().to_string()).collect();

    let mut tasks = Vec::new();
    for tenant in tenants.clone() {
        let client = server.client.clone();
        let url = server.url("/api/sample/records");
        tasks.push(tokio::spawn(async move {
            for i in 0..5 {
                client
                    .post(&url)
                    .header(TENANT_HEADER, tenant.as_str())
                    .json(&serde_json::json!({ "value": format!("{}-{}", tenant, i) }))
                    .send()
                    .await?;
            }
            anyhow::Ok(())
        }));
    }
    for task in tasks {
        task.await??;
    }

    for tenant in &tenants {
        let body: Value = server.list_records(Some(tenant)).await?.json().await?;
        let records = body["data"].as_array().expect("data array");
        assert_eq!(records.len(), 5);
        assert!(records.iter().all(|r| r["tenantId"] == tenant.as_str()));
    }
    Ok(())
}
