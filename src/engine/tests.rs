use super::*;
use crate::core::error::StoreError;
use crate::storage::{KeyValueStore, MemStore, StoreResult};
use crate::test_support::{linked_service, sample_plan};
use crate::validation::SchemaValidator;
use async_trait::async_trait;
use bytes::Bytes;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};

fn engine_over(backend: Arc<dyn KeyValueStore>) -> PlanEngine {
    PlanEngine::new(
        EntityStore::new(backend),
        Arc::new(SchemaValidator::new().unwrap()),
    )
}

fn engine() -> PlanEngine {
    engine_over(Arc::new(MemStore::new()))
}

fn caller() -> Principal {
    Principal {
        subject: "tester".to_string(),
    }
}

fn if_match(etag: &ETag) -> Conditional {
    Conditional::Tags(vec![etag.clone()])
}

async fn current_etag(engine: &PlanEngine, id: &str) -> ETag {
    match engine.get_plan(id, None).await.unwrap() {
        ReadOutcome::Found(stored) => stored.etag,
        ReadOutcome::NotModified { .. } => panic!("unconditional read returned 304"),
    }
}

fn linked_ids(document: &PlanView) -> Vec<&str> {
    document
        .linked_plan_services
        .iter()
        .map(|e| e.object_id.as_str())
        .collect()
}

#[tokio::test]
async fn test_create_then_get_returns_same_document_and_tag() {
    let engine = engine();
    let doc = sample_plan("plan-1");

    let created = engine.create_plan(doc.clone(), &caller()).await.unwrap();
    assert_eq!(serde_json::to_value(&created.document).unwrap(), doc);

    match engine.get_plan("plan-1", None).await.unwrap() {
        ReadOutcome::Found(stored) => {
            assert_eq!(stored.etag, created.etag);
            assert_eq!(serde_json::to_value(&stored.document).unwrap(), doc);
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
}

#[tokio::test]
async fn test_tag_is_stable_across_reads() {
    let engine = engine();
    engine.create_plan(sample_plan("p"), &caller()).await.unwrap();
    assert_eq!(current_etag(&engine, "p").await, current_etag(&engine, "p").await);
}

#[tokio::test]
async fn test_create_collision_wins_over_validation() {
    let engine = engine();
    engine.create_plan(sample_plan("p"), &caller()).await.unwrap();

    let err = engine
        .create_plan(json!({"objectId": "p"}), &caller())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Conflict(ref id) if id == "p"));

    let err = engine.create_plan(sample_plan("p"), &caller()).await.unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));
}

#[tokio::test]
async fn test_invalid_create_writes_nothing() {
    let engine = engine();
    let mut doc = sample_plan("p");
    doc["planCostShares"]["deductible"] = json!("lots");

    let err = engine.create_plan(doc, &caller()).await.unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
    assert!(engine.list_plans().await.unwrap().is_empty());
    for kind in EntityKind::ALL {
        assert!(engine.store().list_ids(kind).await.unwrap().is_empty());
    }
}

#[tokio::test]
async fn test_get_missing_plan_is_not_found() {
    let err = engine().get_plan("nope", None).await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[tokio::test]
async fn test_if_none_match_yields_not_modified() {
    let engine = engine();
    let created = engine.create_plan(sample_plan("p"), &caller()).await.unwrap();

    let outcome = engine.get_plan("p", Some(&if_match(&created.etag))).await.unwrap();
    assert!(matches!(outcome, ReadOutcome::NotModified { ref etag } if *etag == created.etag));

    let outcome = engine.get_plan("p", Some(&Conditional::Any)).await.unwrap();
    assert!(matches!(outcome, ReadOutcome::NotModified { .. }));

    let stale = Conditional::parse("\"stale\"").unwrap();
    let outcome = engine.get_plan("p", Some(&stale)).await.unwrap();
    assert!(matches!(outcome, ReadOutcome::Found(_)));
}

#[tokio::test]
async fn test_mutations_require_if_match_and_do_not_mutate() {
    let engine = engine();
    let created = engine.create_plan(sample_plan("p"), &caller()).await.unwrap();
    let mut changed = sample_plan("p");
    changed["planType"] = json!("outOfNetwork");

    let err = engine.replace_plan("p", changed.clone(), None, &caller()).await.unwrap_err();
    assert!(matches!(err, Error::PreconditionRequired));

    let err = engine
        .patch_plan("p", json!({"planType": "x"}), Some(&Conditional::Any), &caller())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::PreconditionRequired));

    let err = engine.delete_plan("p", None, &caller()).await.unwrap_err();
    assert!(matches!(err, Error::PreconditionRequired));

    assert_eq!(current_etag(&engine, "p").await, created.etag);
}

#[tokio::test]
async fn test_stale_tag_is_rejected_without_mutation() {
    let engine = engine();
    let created = engine.create_plan(sample_plan("p"), &caller()).await.unwrap();

    let mut changed = sample_plan("p");
    changed["planType"] = json!("outOfNetwork");
    let updated = engine
        .replace_plan("p", changed, Some(&if_match(&created.etag)), &caller())
        .await
        .unwrap();
    assert_ne!(updated.etag, created.etag);

    // The first tag is now stale for every mutating verb
    let stale = if_match(&created.etag);
    let err = engine.replace_plan("p", sample_plan("p"), Some(&stale), &caller()).await.unwrap_err();
    assert!(matches!(err, Error::PreconditionFailed { .. }));
    let err = engine.patch_plan("p", json!({"planType": "y"}), Some(&stale), &caller()).await.unwrap_err();
    assert!(matches!(err, Error::PreconditionFailed { .. }));
    let err = engine.delete_plan("p", Some(&stale), &caller()).await.unwrap_err();
    assert!(matches!(err, Error::PreconditionFailed { .. }));

    assert_eq!(current_etag(&engine, "p").await, updated.etag);
}

#[tokio::test]
async fn test_replace_missing_plan_checks_precondition_first() {
    let engine = engine();
    let err = engine.replace_plan("p", sample_plan("p"), None, &caller()).await.unwrap_err();
    assert!(matches!(err, Error::PreconditionRequired));

    let any_tag = Conditional::parse("\"abc\"").unwrap();
    let err = engine
        .replace_plan("p", sample_plan("p"), Some(&any_tag), &caller())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[tokio::test]
async fn test_replace_rejects_path_body_mismatch_and_invalid_body() {
    let engine = engine();
    let created = engine.create_plan(sample_plan("p"), &caller()).await.unwrap();
    let tag = if_match(&created.etag);

    let err = engine.replace_plan("p", sample_plan("q"), Some(&tag), &caller()).await.unwrap_err();
    assert!(matches!(err, Error::Validation(ref e) if e[0].field == "/objectId"));

    let mut invalid = sample_plan("p");
    invalid.as_object_mut().unwrap().remove("planType");
    let err = engine.replace_plan("p", invalid, Some(&tag), &caller()).await.unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    assert_eq!(current_etag(&engine, "p").await, created.etag);
}

#[tokio::test]
async fn test_patch_appends_new_linked_service() {
    let engine = engine();
    let mut doc = sample_plan("p");
    doc["linkedPlanServices"] = json!([linked_service("S1", "Physical")]);
    let created = engine.create_plan(doc, &caller()).await.unwrap();

    let patch = json!({"linkedPlanServices": [linked_service("S2", "Dental")]});
    let patched = engine
        .patch_plan("p", patch, Some(&if_match(&created.etag)), &caller())
        .await
        .unwrap();

    assert_eq!(linked_ids(&patched.document), vec!["S1", "S2"]);
    assert_ne!(patched.etag, created.etag);

    match engine.get_plan("p", None).await.unwrap() {
        ReadOutcome::Found(stored) => {
            assert_eq!(linked_ids(&stored.document), vec!["S1", "S2"]);
            assert_eq!(stored.etag, patched.etag);
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
}

#[tokio::test]
async fn test_patch_updates_nested_child_in_place() {
    let engine = engine();
    let created = engine.create_plan(sample_plan("p"), &caller()).await.unwrap();

    let patch = json!({"linkedPlanServices": [
        {"objectId": "p-ps-1", "planserviceCostShares": {"copay": 15}}
    ]});
    let patched = engine
        .patch_plan("p", patch, Some(&if_match(&created.etag)), &caller())
        .await
        .unwrap();

    let entry = &patched.document.linked_plan_services[0];
    let cost_share = entry.planservice_cost_shares.as_ref().unwrap();
    assert_eq!(cost_share.copay, 15.into());
    assert_eq!(cost_share.object_id, "p-ps-1-cs");
    assert_ne!(patched.etag, created.etag);
}

#[tokio::test]
async fn test_patch_switching_child_id_leaves_shared_child_untouched() {
    let engine = engine();
    let other = engine.create_plan(sample_plan("a"), &caller()).await.unwrap();
    let created = engine.create_plan(sample_plan("p"), &caller()).await.unwrap();

    let patch = json!({"linkedPlanServices": [
        {"objectId": "p-ps-1", "planserviceCostShares": {"objectId": "a-ps-1-cs"}}
    ]});
    let err = engine
        .patch_plan("p", patch, Some(&if_match(&created.etag)), &caller())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    let shared = engine
        .store()
        .get::<crate::types::CostShare>("a-ps-1-cs")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(shared.value.deductible, 10.into());
    assert_eq!(current_etag(&engine, "a").await, other.etag);
    assert_eq!(current_etag(&engine, "p").await, created.etag);
}

#[tokio::test]
async fn test_patch_switching_child_id_with_full_child() {
    let engine = engine();
    let created = engine.create_plan(sample_plan("p"), &caller()).await.unwrap();

    let patch = json!({"linkedPlanServices": [
        {"objectId": "p-ps-1", "planserviceCostShares": crate::test_support::cost_share("fresh-cs", 5, 1)}
    ]});
    let patched = engine
        .patch_plan("p", patch, Some(&if_match(&created.etag)), &caller())
        .await
        .unwrap();

    let entry = &patched.document.linked_plan_services[0];
    let cost_share = entry.planservice_cost_shares.as_ref().unwrap();
    assert_eq!(cost_share.object_id, "fresh-cs");
    assert_eq!(cost_share.deductible, 5.into());

    let previous = engine
        .store()
        .get::<crate::types::CostShare>("p-ps-1-cs")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(previous.value.copay, 0.into());
}

#[tokio::test]
async fn test_patch_cannot_change_plan_id() {
    let engine = engine();
    let created = engine.create_plan(sample_plan("p"), &caller()).await.unwrap();
    let err = engine
        .patch_plan("p", json!({"objectId": "q"}), Some(&if_match(&created.etag)), &caller())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
}

#[tokio::test]
async fn test_child_change_alone_changes_composite_tag() {
    let engine = engine();
    let created = engine.create_plan(sample_plan("p"), &caller()).await.unwrap();

    // Rewrite one leaf directly; the root reference is untouched
    let mut service = engine
        .store()
        .get::<crate::types::Service>("p-ps-1-svc")
        .await
        .unwrap()
        .unwrap()
        .value;
    service.name = "Renamed".into();
    engine.store().put(&service).await.unwrap();

    assert_ne!(current_etag(&engine, "p").await, created.etag);
}

#[tokio::test]
async fn test_delete_then_second_delete_is_not_found() {
    let engine = engine();
    let created = engine.create_plan(sample_plan("p"), &caller()).await.unwrap();
    let tag = if_match(&created.etag);

    engine.delete_plan("p", Some(&tag), &caller()).await.unwrap();
    assert!(matches!(engine.get_plan("p", None).await, Err(Error::NotFound(_))));

    let err = engine.delete_plan("p", Some(&tag), &caller()).await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));

    // Children are left in place
    assert!(engine.store().exists(EntityKind::Service, "p-ps-1-svc").await.unwrap());
}

#[tokio::test]
async fn test_list_plans_is_sorted() {
    let engine = engine();
    for id in ["b", "a", "c"] {
        engine.create_plan(sample_plan(id), &caller()).await.unwrap();
    }
    assert_eq!(engine.list_plans().await.unwrap(), vec!["a", "b", "c"]);
}

#[tokio::test]
async fn test_orphan_collection_removes_only_unreachable_children() {
    let engine = engine();
    let kept = engine.create_plan(sample_plan("keep"), &caller()).await.unwrap();
    let dropped = engine.create_plan(sample_plan("drop"), &caller()).await.unwrap();
    engine
        .delete_plan("drop", Some(&if_match(&dropped.etag)), &caller())
        .await
        .unwrap();

    let report = engine.collect_orphans().await.unwrap();
    assert_eq!(
        report,
        OrphanReport {
            cost_shares: 2,
            linked_services: 1,
            services: 1,
        }
    );
    assert_eq!(report.total(), 4);

    assert_eq!(current_etag(&engine, "keep").await, kept.etag);
    assert_eq!(engine.collect_orphans().await.unwrap().total(), 0);
}

#[tokio::test]
async fn test_replaced_cost_share_becomes_orphan() {
    let engine = engine();
    let created = engine.create_plan(sample_plan("p"), &caller()).await.unwrap();
    let patch = json!({"planCostShares": crate::test_support::cost_share("cs-new", 1, 1)});
    engine
        .patch_plan("p", patch, Some(&if_match(&created.etag)), &caller())
        .await
        .unwrap();

    assert!(engine.store().exists(EntityKind::CostShare, "p-cs").await.unwrap());
    let report = engine.collect_orphans().await.unwrap();
    assert_eq!(report.cost_shares, 1);
    assert!(!engine.store().exists(EntityKind::CostShare, "p-cs").await.unwrap());
}

#[tokio::test]
async fn test_shared_child_id_is_visible_to_both_plans() {
    let engine = engine();
    let first = engine.create_plan(sample_plan("a"), &caller()).await.unwrap();

    let mut second = sample_plan("b");
    second["linkedPlanServices"][0]["linkedService"]["objectId"] = json!("a-ps-1-svc");
    second["linkedPlanServices"][0]["linkedService"]["name"] = json!("Overwritten");
    engine.create_plan(second, &caller()).await.unwrap();

    // Writing plan b rewrote a child plan a refers to
    assert_ne!(current_etag(&engine, "a").await, first.etag);
}

/// Adapter that starts failing writes after a fixed number of successes
struct FailingStore {
    inner: MemStore,
    puts_left: AtomicUsize,
}

#[async_trait]
impl KeyValueStore for FailingStore {
    async fn get(&self, key: &str) -> StoreResult<Option<Bytes>> {
        self.inner.get(key).await
    }

    async fn put(&self, key: &str, value: Bytes) -> StoreResult<()> {
        let allowed = self
            .puts_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if !allowed {
            return Err(StoreError::Backend("write quota exhausted".into()));
        }
        self.inner.put(key, value).await
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        self.inner.delete(key).await
    }

    async fn list_keys(&self, prefix: &str) -> StoreResult<Vec<String>> {
        self.inner.list_keys(prefix).await
    }

    fn backend_name(&self) -> &'static str {
        "failing"
    }
}

#[tokio::test]
async fn test_failed_child_write_leaves_reference_untouched() {
    // Five writes for the create, then the replace fails on its third write
    let backend = Arc::new(FailingStore {
        inner: MemStore::new(),
        puts_left: AtomicUsize::new(7),
    });
    let engine = engine_over(backend);
    let created = engine.create_plan(sample_plan("p"), &caller()).await.unwrap();

    let mut changed = sample_plan("p");
    changed["planType"] = json!("outOfNetwork");
    changed["linkedPlanServices"] = json!([
        linked_service("p-ps-1", "Yearly physical"),
        linked_service("p-ps-2", "Dental")
    ]);
    let err = engine
        .replace_plan("p", changed, Some(&if_match(&created.etag)), &caller())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Store(_)));
    assert!(err.is_server_error());

    match engine.get_plan("p", None).await.unwrap() {
        ReadOutcome::Found(stored) => {
            assert_eq!(stored.document.plan_type, "inNetwork");
            assert_eq!(linked_ids(&stored.document), vec!["p-ps-1"]);
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
}
