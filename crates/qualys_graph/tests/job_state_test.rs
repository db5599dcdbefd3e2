use qualys_error::{JobStateErrorKind, QualysErrorKind};
use qualys_graph::{Entity, InMemoryJobState, JobState, Relationship, RelationshipClass};
use serde_json::{Value, json};

fn host(id: u64) -> Entity {
    Entity::new(format!("qualys_host:{}", id), "qualys_host", &["Host"], format!("host-{}", id))
}

fn finding(id: u64) -> Entity {
    Entity::new(
        format!("qualys_host_finding:{}", id),
        "qualys_host_finding",
        &["Finding"],
        format!("finding-{}", id),
    )
}

#[tokio::test]
async fn test_add_and_read_back_entities() {
    let state = InMemoryJobState::new();
    state.add_entities(vec![host(1), host(2), finding(1)]).await.unwrap();

    assert_eq!(state.entity_count().await, 3);
    assert!(state.has_key("qualys_host:2").await);
    assert!(!state.has_key("qualys_host:3").await);
    assert_eq!(state.get_entity("qualys_host:1").await, Some(host(1)));

    let hosts = state.entities_of_type("qualys_host").await;
    let keys: Vec<&str> = hosts.iter().map(|entity| entity.key().as_str()).collect();
    assert_eq!(keys, vec!["qualys_host:1", "qualys_host:2"]);
}

#[tokio::test]
async fn test_duplicate_key_rejects_whole_batch() {
    let state = InMemoryJobState::new();
    state.add_entities(vec![host(1)]).await.unwrap();

    let err = state.add_entities(vec![host(2), host(1)]).await.unwrap_err();
    match err.kind() {
        QualysErrorKind::JobState(e) => {
            assert_eq!(e.kind, JobStateErrorKind::DuplicateKey("qualys_host:1".to_string()));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(state.entity_count().await, 1);
    assert!(!state.has_key("qualys_host:2").await);
}

#[tokio::test]
async fn test_duplicate_within_batch_is_rejected() {
    let state = InMemoryJobState::new();
    let rel = Relationship::new(RelationshipClass::Has, &host(1), &finding(1));

    assert!(state.add_relationships(vec![rel.clone(), rel]).await.is_err());
    assert_eq!(state.relationship_count().await, 0);
}

#[tokio::test]
async fn test_relationship_keys_are_tracked() {
    let state = InMemoryJobState::new();
    let rel = Relationship::new(RelationshipClass::Has, &host(1), &finding(1));
    let key = rel.key().clone();

    state.add_relationships(vec![rel.clone()]).await.unwrap();
    assert!(state.has_key(&key).await);
    assert!(state.add_relationships(vec![rel]).await.is_err());
}

#[tokio::test]
async fn test_data_round_trip() {
    let state = InMemoryJobState::new();
    assert!(state.get_data("web_app_ids").await.is_none());

    state.set_data("web_app_ids", json!([1, 2, 3])).await;
    assert_eq!(state.get_data("web_app_ids").await, Some(json!([1, 2, 3])));
}

#[tokio::test]
async fn test_write_to_dir() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("graph");

    let state = InMemoryJobState::new();
    state
        .add_entities(vec![host(1).with_property("ipAddress", "10.0.0.1"), finding(1)])
        .await
        .unwrap();
    state
        .add_relationships(vec![Relationship::new(RelationshipClass::Has, &host(1), &finding(1))])
        .await
        .unwrap();

    state.write_to_dir(&output).await.unwrap();

    let entities: Value =
        serde_json::from_str(&std::fs::read_to_string(output.join("entities.json")).unwrap()).unwrap();
    assert_eq!(entities["entities"].as_array().unwrap().len(), 2);
    assert_eq!(entities["entities"][0]["_key"], "qualys_host:1");
    assert_eq!(entities["entities"][0]["ipAddress"], "10.0.0.1");

    let relationships: Value =
        serde_json::from_str(&std::fs::read_to_string(output.join("relationships.json")).unwrap())
            .unwrap();
    assert_eq!(
        relationships["relationships"][0]["_type"],
        "qualys_host_has_host_finding"
    );
}

#[tokio::test]
async fn test_write_to_unwritable_path_fails() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("file");
    std::fs::write(&blocker, "not a directory").unwrap();

    let state = InMemoryJobState::new();
    let err = state.write_to_dir(blocker.join("graph")).await.unwrap_err();
    assert!(matches!(err.kind(), QualysErrorKind::JobState(_)));
}
