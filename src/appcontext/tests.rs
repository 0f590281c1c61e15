use std::sync::Arc;

use serde_json::json;

use super::*;

fn meta() -> CompositeAppMeta {
    CompositeAppMeta {
        project: "proj1".to_string(),
        composite_app: "capp1".to_string(),
        version: "v1".to_string(),
        release: "r1".to_string(),
        deployment_intent_group: "dig1".to_string(),
        namespace: "default".to_string(),
        level: "0".to_string(),
        ..Default::default()
    }
}

async fn new_context() -> (Arc<MemoryContextStore>, AppContext) {
    let store = Arc::new(MemoryContextStore::new());
    let ctx = AppContext::create(store.clone(), &meta()).await.unwrap();
    (store, ctx)
}

#[tokio::test]
async fn test_create_then_load_reads_meta() {
    let (store, ctx) = new_context().await;

    let loaded = AppContext::load(store, ctx.id().clone()).await.unwrap();

    assert_eq!(loaded.meta().await.unwrap(), meta());
    assert_eq!(loaded.root().as_str(), format!("/context/{}/", ctx.id()));
}

#[tokio::test]
async fn test_load_unknown_id() {
    let store = Arc::new(MemoryContextStore::new());
    let err = AppContext::load(store, "missing").await.unwrap_err();
    assert!(matches!(err, StoreError::ContextNotFound(ref id) if id.as_str() == "missing"));
}

#[tokio::test]
async fn test_load_empty_id() {
    let store = Arc::new(MemoryContextStore::new());
    assert!(matches!(
        AppContext::load(store, "").await,
        Err(StoreError::ContextNotFound(_))
    ));
}

#[test]
fn test_meta_wire_names() {
    let value = serde_json::to_value(meta()).unwrap();
    assert_eq!(value["Project"], "proj1");
    assert_eq!(value["CompositeApp"], "capp1");
    assert_eq!(value["DeploymentIntentGroup"], "dig1");
    assert!(value.get("ChildContextIDs").is_some());
}

#[tokio::test]
async fn test_app_cluster_resource_hierarchy() {
    let (_, ctx) = new_context().await;

    let app = ctx.add_app("web").await.unwrap();
    let c1 = ctx.add_cluster(&app, "provider+edge1").await.unwrap();
    ctx.add_cluster(&app, "provider+edge2").await.unwrap();
    let res = ctx
        .add_resource(&c1, "web+Deployment", json!({"kind": "Deployment"}))
        .await
        .unwrap();

    assert_eq!(ctx.app_handle("web").await.unwrap(), app);
    assert_eq!(ctx.cluster_handle("web", "provider+edge1").await.unwrap(), c1);
    assert_eq!(
        ctx.resource_handle("web", "provider+edge1", "web+Deployment")
            .await
            .unwrap(),
        res
    );
    assert_eq!(
        ctx.cluster_names("web").await.unwrap(),
        vec!["provider+edge1", "provider+edge2"]
    );
    assert_eq!(
        ctx.resource_names("web", "provider+edge1").await.unwrap(),
        vec!["web+Deployment"]
    );
    assert_eq!(ctx.value(&res).await.unwrap()["kind"], "Deployment");
}

#[tokio::test]
async fn test_cluster_names_empty_is_error() {
    let (_, ctx) = new_context().await;
    ctx.add_app("web").await.unwrap();
    assert!(matches!(
        ctx.cluster_names("web").await,
        Err(StoreError::Backend(_))
    ));
}

#[tokio::test]
async fn test_empty_names_rejected() {
    let (_, ctx) = new_context().await;
    assert!(matches!(ctx.add_app("").await, Err(StoreError::InvalidName("app"))));
    let app = ctx.add_app("web").await.unwrap();
    assert!(matches!(
        ctx.add_cluster(&app, "").await,
        Err(StoreError::InvalidName("cluster"))
    ));
}

#[tokio::test]
async fn test_missing_handle() {
    let (_, ctx) = new_context().await;
    assert!(matches!(
        ctx.app_handle("nope").await,
        Err(StoreError::HandleNotFound("app"))
    ));
}

#[tokio::test]
async fn test_update_value_requires_existing_handle() {
    let (_, ctx) = new_context().await;
    let app = ctx.add_app("web").await.unwrap();
    let c1 = ctx.add_cluster(&app, "c1").await.unwrap();
    let res = ctx.add_resource(&c1, "r", json!(1)).await.unwrap();

    ctx.update_value(&res, json!(2)).await.unwrap();
    assert_eq!(ctx.value(&res).await.unwrap(), json!(2));

    let stale = c1.child("resource", "gone");
    assert!(matches!(
        ctx.update_value(&stale, json!(3)).await,
        Err(StoreError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_status_and_instruction() {
    let (_, ctx) = new_context().await;
    let app = ctx.add_app("web").await.unwrap();

    ctx.add_level_value(&app, "status", json!({"ready": true}))
        .await
        .unwrap();
    assert_eq!(ctx.status(&app).await.unwrap()["ready"], true);

    ctx.add_instruction(
        &ctx.root(),
        InstructionLevel::App,
        InstructionType::Order,
        json!({"apporder": ["web"]}),
    )
    .await
    .unwrap();
    let order = ctx.app_instruction(InstructionType::Order).await.unwrap();
    assert_eq!(order["apporder"][0], "web");
}

#[test]
fn test_instruction_parsing() {
    assert_eq!("order".parse::<InstructionType>().unwrap(), InstructionType::Order);
    assert_eq!(
        "subresource".parse::<InstructionLevel>().unwrap(),
        InstructionLevel::Subresource
    );
    assert!(matches!(
        "sequence".parse::<InstructionType>(),
        Err(StoreError::InvalidInstruction("type"))
    ));
    assert!(matches!(
        "cluster".parse::<InstructionLevel>(),
        Err(StoreError::InvalidInstruction("level"))
    ));
}

#[tokio::test]
async fn test_revision_counts_mutations() {
    let (_, ctx) = new_context().await;
    // meta write on create
    assert_eq!(ctx.revision().await.unwrap(), 1);

    let app = ctx.add_app("web").await.unwrap();
    ctx.add_cluster(&app, "c1").await.unwrap();
    assert_eq!(ctx.revision().await.unwrap(), 3);

    // reads leave the revision alone
    ctx.cluster_names("web").await.unwrap();
    assert_eq!(ctx.revision().await.unwrap(), 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_mutations_each_count() {
    let (_, ctx) = new_context().await;

    let tasks: Vec<_> = (0..32)
        .map(|i| {
            let ctx = ctx.clone();
            tokio::spawn(async move { ctx.add_app(&format!("app{i}")).await })
        })
        .collect();
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    assert_eq!(ctx.revision().await.unwrap(), 33);
}

#[tokio::test]
async fn test_delete_app_removes_subtree() {
    let (_, ctx) = new_context().await;
    let app = ctx.add_app("web").await.unwrap();
    ctx.add_cluster(&app, "c1").await.unwrap();
    ctx.add_app("db").await.unwrap();

    ctx.delete_app(&app).await.unwrap();

    assert!(ctx.app_handle("web").await.is_err());
    assert!(ctx.app_handle("db").await.is_ok());
}

#[tokio::test]
async fn test_delete_context() {
    let (store, ctx) = new_context().await;
    ctx.add_app("web").await.unwrap();

    ctx.delete().await.unwrap();

    assert!(store.is_empty().await);
    assert!(matches!(
        AppContext::load(store, ctx.id().clone()).await,
        Err(StoreError::ContextNotFound(_))
    ));
}

#[tokio::test]
async fn test_store_failure_propagates() {
    let (store, ctx) = new_context().await;
    store.set_fail_on_put(true).await;
    assert!(matches!(ctx.add_app("web").await, Err(StoreError::Backend(_))));
}

#[test]
fn test_generated_ids_are_distinct() {
    let a = AppContextId::generate();
    let b = AppContextId::generate();
    assert_ne!(a, b);
    assert_eq!(a.as_str().len(), 32);
}
