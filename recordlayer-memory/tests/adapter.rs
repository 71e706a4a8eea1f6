use bson::{Bson, doc};
use recordlayer_core::{
    adapter::{Adapter, RecordStore},
    backend::StoreBackend,
    config::AdapterConfig,
    error::AdapterError,
    id::FnIdGenerator,
    query::{Expr, Filter, QueryOptions, SortDirection},
    record::Record,
    schema::{FieldDescriptor, FieldKind, Schema},
    transaction::TransactionState,
    update::Update,
};
use recordlayer_memory::InMemoryConnector;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn schema() -> Schema {
    Schema::builder()
        .record_type("vocabulary", [
            FieldDescriptor::new("name", FieldKind::String),
            FieldDescriptor::new("level", FieldKind::Number),
            FieldDescriptor::new("learnedAt", FieldKind::Date),
            FieldDescriptor::array("tags", FieldKind::String),
            FieldDescriptor::to_many("translations", "vocabulary").inverse("translations"),
        ])
        .record_type("user", [
            FieldDescriptor::new("name", FieldKind::String),
        ])
        .build()
        .unwrap()
}

async fn connected(config: AdapterConfig) -> Adapter<InMemoryConnector> {
    init_tracing();
    let adapter = Adapter::new(schema(), InMemoryConnector::new());
    adapter.connect(config.url("memory://")).await.unwrap();
    adapter
}

fn id_of(record: &Record) -> Bson {
    record.id().cloned().unwrap()
}

fn names(records: &[Record]) -> Vec<&str> {
    records
        .iter()
        .filter_map(|record| record.get("name").and_then(Bson::as_str))
        .collect()
}

#[tokio::test]
async fn create_assigns_missing_identifiers() {
    let adapter = connected(AdapterConfig::new()).await;

    let created = adapter
        .create("vocabulary", vec![
            Record::new().with("name", "casa"),
            Record::with_id("perro").with("name", "perro"),
        ])
        .await
        .unwrap();

    let generated = created[0].id().and_then(Bson::as_str).unwrap();
    assert_eq!(generated.len(), 10);
    assert!(generated.chars().all(|c| c.is_ascii_alphanumeric()));
    assert_eq!(created[1].id(), Some(&Bson::from("perro")));

    // Declared sequences come back empty when they were never set.
    assert_eq!(created[0].get_array("translations"), Some(&Vec::new()));
    assert_eq!(created[0].get_array("tags"), Some(&Vec::new()));
    assert!(created[0].get("_id").is_none());

    assert!(adapter.create("vocabulary", Vec::new()).await.unwrap().is_empty());
}

#[tokio::test]
async fn custom_identifier_strategy() {
    init_tracing();
    let adapter = Adapter::new(schema(), InMemoryConnector::new())
        .with_id_generator(FnIdGenerator(|record_type: &str| Bson::from(format!("{record_type}-1"))));
    adapter.connect(AdapterConfig::new().url("memory://")).await.unwrap();

    let created = adapter
        .create("user", vec![Record::new().with("name", "ana")])
        .await
        .unwrap();

    assert_eq!(created[0].id(), Some(&Bson::from("user-1")));
}

#[tokio::test]
async fn duplicate_identifiers_conflict() {
    let adapter = connected(AdapterConfig::new()).await;

    adapter
        .create("user", vec![Record::with_id("ana")])
        .await
        .unwrap();

    let err = adapter
        .create("user", vec![Record::with_id("ana")])
        .await
        .unwrap_err();
    assert!(err.is_conflict());

    let err = adapter
        .create("user", vec![Record::with_id("leo"), Record::with_id("leo")])
        .await
        .unwrap_err();
    assert!(matches!(err, AdapterError::Conflict(_)));
}

#[tokio::test]
async fn count_ignores_paging() {
    let adapter = connected(AdapterConfig::new()).await;
    let records = (1..=5)
        .map(|level| Record::with_id(format!("w{level}")).with("level", level))
        .collect();
    adapter.create("vocabulary", records).await.unwrap();

    let options = QueryOptions::new()
        .sort("level", SortDirection::Desc)
        .offset(1)
        .limit(2);
    let found = adapter.find("vocabulary", None, Some(&options)).await.unwrap();

    assert_eq!(found.count, 5);
    assert_eq!(
        found.records.iter().map(id_of).collect::<Vec<_>>(),
        vec![Bson::from("w4"), Bson::from("w3")]
    );

    let found = adapter
        .find("vocabulary", None, Some(&QueryOptions::new().range("level", Some(2), Some(3)).limit(1)))
        .await
        .unwrap();
    assert_eq!((found.records.len(), found.count), (1, 2));

    let found = adapter
        .find("vocabulary", None, Some(&QueryOptions::new().limit(0)))
        .await
        .unwrap();
    assert!(found.records.is_empty());
    assert_eq!(found.count, 5);
}

#[tokio::test]
async fn empty_identifier_lists_never_reach_the_store() {
    init_tracing();
    let adapter = Adapter::new(schema(), InMemoryConnector::new());

    // Not connected: anything that would touch the store must fail.
    let found = adapter.find("user", Some(&[]), None).await.unwrap();
    assert!(found.records.is_empty());
    assert_eq!(found.count, 0);
    assert_eq!(adapter.delete("user", Some(&[])).await.unwrap(), 0);
    assert_eq!(adapter.update("user", vec![Update::new("ana")]).await.unwrap(), 0);

    assert!(matches!(
        adapter.find("user", None, None).await,
        Err(AdapterError::NotConnected)
    ));
}

#[tokio::test]
async fn find_by_identifiers_and_conditions() {
    let adapter = connected(AdapterConfig::new()).await;
    adapter
        .create("vocabulary", vec![
            Record::with_id("a").with("name", "casa").with("level", 1).with("tags", vec!["home"]),
            Record::with_id("b").with("name", "perro").with("level", 2).with("tags", vec!["animal", "pet"]),
            Record::with_id("c").with("name", "gato").with("level", 2),
        ])
        .await
        .unwrap();

    let ids = [Bson::from("a"), Bson::from("b"), Bson::from("z")];
    let found = adapter
        .find("vocabulary", Some(&ids), Some(&QueryOptions::new().matching("level", 2)))
        .await
        .unwrap();
    assert_eq!(names(&found.records), vec!["perro"]);
    assert_eq!(found.count, 1);

    let found = adapter
        .find("vocabulary", None, Some(&QueryOptions::new().matching_any("name", ["casa", "gato"])))
        .await
        .unwrap();
    assert_eq!(names(&found.records), vec!["casa", "gato"]);

    // Sequence fields: match means "contains any", range bounds the length,
    // exists means non-empty.
    let found = adapter
        .find("vocabulary", None, Some(&QueryOptions::new().matching("tags", "pet")))
        .await
        .unwrap();
    assert_eq!(names(&found.records), vec!["perro"]);

    let found = adapter
        .find("vocabulary", None, Some(&QueryOptions::new().range("tags", Some(2), None)))
        .await
        .unwrap();
    assert_eq!(names(&found.records), vec!["perro"]);

    let found = adapter
        .find("vocabulary", None, Some(&QueryOptions::new().exists("tags", false)))
        .await
        .unwrap();
    assert_eq!(names(&found.records), vec!["gato"]);

    let found = adapter
        .find("vocabulary", None, Some(&QueryOptions::new().exists("name", true).exists("level", false)))
        .await
        .unwrap();
    assert_eq!(found.count, 0);
}

#[tokio::test]
async fn date_ranges() {
    let adapter = connected(AdapterConfig::new()).await;
    let now = chrono::Utc::now();
    let day = chrono::Duration::days(1);

    adapter
        .create("vocabulary", vec![
            Record::with_id("old").with("learnedAt", bson::DateTime::from_chrono(now - day * 10)),
            Record::with_id("new").with("learnedAt", bson::DateTime::from_chrono(now)),
        ])
        .await
        .unwrap();

    let since = bson::DateTime::from_chrono(now - day);
    let found = adapter
        .find("vocabulary", None, Some(&QueryOptions::new().range("learnedAt", Some(since), None)))
        .await
        .unwrap();

    assert_eq!(found.records.iter().map(id_of).collect::<Vec<_>>(), vec![Bson::from("new")]);
}

#[tokio::test]
async fn query_override_replaces_the_filter() {
    let adapter = connected(AdapterConfig::new()).await;
    adapter
        .create("user", vec![
            Record::with_id("ana").with("name", "ana"),
            Record::with_id("leo").with("name", "leo"),
        ])
        .await
        .unwrap();

    let options = QueryOptions::new()
        .matching("name", "ana")
        .query(|compiled: Option<&Expr>| {
            assert!(compiled.is_some());
            Some(Filter::eq("name", "leo"))
        });
    let found = adapter.find("user", None, Some(&options)).await.unwrap();
    assert_eq!(names(&found.records), vec!["leo"]);

    // Returning nothing keeps the compiled filter.
    let options = QueryOptions::new().matching("name", "ana").query(|_| None);
    let found = adapter.find("user", None, Some(&options)).await.unwrap();
    assert_eq!(names(&found.records), vec!["ana"]);
}

#[tokio::test]
async fn projection_and_identifier_sort() {
    let adapter = connected(AdapterConfig::new()).await;
    adapter
        .create("user", vec![
            Record::with_id("b").with("name", "leo").with("age", 30),
            Record::with_id("a").with("name", "ana").with("age", 25),
        ])
        .await
        .unwrap();

    let options = QueryOptions::new().include("name").sort("id", SortDirection::Asc);
    let found = adapter.find("user", None, Some(&options)).await.unwrap();

    assert_eq!(found.records[0], Record::with_id("a").with("name", "ana"));
    assert_eq!(found.records[1].id(), Some(&Bson::from("b")));

    let found = adapter
        .find("user", None, Some(&QueryOptions::new().exclude("age").exclude("name")))
        .await
        .unwrap();
    assert_eq!(found.records[0], Record::with_id("b"));

    let mixed = QueryOptions::new().include("name").exclude("age");
    assert!(matches!(
        adapter.find("user", None, Some(&mixed)).await,
        Err(AdapterError::InvalidQuery(_))
    ));
}

#[tokio::test]
async fn vocabulary_translations_link_and_unlink() {
    let adapter = connected(AdapterConfig::new()).await;
    let created = adapter
        .create("vocabulary", vec![
            Record::new().with("name", "casa"),
            Record::new().with("name", "house"),
        ])
        .await
        .unwrap();
    let (casa, house) = (id_of(&created[0]), id_of(&created[1]));

    let modified = adapter
        .update("vocabulary", vec![
            Update::new(casa.clone()).push("translations", house.clone()),
            Update::new(house.clone()).push("translations", vec![casa.clone()]),
        ])
        .await
        .unwrap();
    assert_eq!(modified, 2);

    let found = adapter
        .find("vocabulary", Some(&[casa.clone()]), None)
        .await
        .unwrap();
    assert_eq!(found.records[0].get_array("translations"), Some(&vec![house.clone()]));

    let found = adapter
        .find("vocabulary", None, Some(&QueryOptions::new().matching("translations", casa.clone())))
        .await
        .unwrap();
    assert_eq!(found.records.iter().map(id_of).collect::<Vec<_>>(), vec![house.clone()]);

    let modified = adapter
        .update("vocabulary", vec![
            Update::new(casa.clone()).pull("translations", vec![house.clone()]),
            Update::new(house.clone()).pull("translations", casa.clone()),
        ])
        .await
        .unwrap();
    assert_eq!(modified, 2);

    let found = adapter
        .find("vocabulary", Some(&[casa.clone(), house.clone()]), None)
        .await
        .unwrap();
    assert!(found
        .records
        .iter()
        .all(|record| record.get_array("translations") == Some(&Vec::new())));
}

#[tokio::test]
async fn update_directives() {
    let adapter = connected(AdapterConfig::new()).await;
    adapter
        .create("vocabulary", vec![Record::with_id("a").with("name", "casa").with("level", 1)])
        .await
        .unwrap();

    let modified = adapter
        .update("vocabulary", vec![
            Update::new("a")
                .replace("name", "hogar")
                .operate("$inc", doc! { "level": 2 }),
            Update::new("missing").replace("name", "x"),
            Update::new("a"),
        ])
        .await
        .unwrap();
    assert_eq!(modified, 1);

    let found = adapter.find("vocabulary", Some(&[Bson::from("a")]), None).await.unwrap();
    assert_eq!(found.records[0].get("name"), Some(&Bson::from("hogar")));
    assert_eq!(found.records[0].get("level"), Some(&Bson::Int32(3)));

    // The raw operator takes precedence over the generated `$set`.
    adapter
        .update("vocabulary", vec![
            Update::new("a")
                .replace("name", "ignored")
                .operate("$set", doc! { "name": "casa" }),
        ])
        .await
        .unwrap();
    let found = adapter.find("vocabulary", Some(&[Bson::from("a")]), None).await.unwrap();
    assert_eq!(found.records[0].get("name"), Some(&Bson::from("casa")));

    assert!(matches!(
        adapter.update("vocabulary", vec![Update::new("a").replace("id", "b")]).await,
        Err(AdapterError::InvalidRecord(_))
    ));
    assert!(matches!(
        adapter.update("vocabulary", vec![Update::new("a").operate("$rename", doc! { "name": "title" })]).await,
        Err(AdapterError::Storage(_))
    ));
}

#[tokio::test]
async fn failing_directives_do_not_skip_the_others() {
    let adapter = connected(AdapterConfig::new()).await;
    adapter
        .create("user", vec![
            Record::with_id("a").with("name", "ana"),
            Record::with_id("b").with("name", "bea"),
        ])
        .await
        .unwrap();

    let result = adapter
        .update("user", vec![
            Update::new("a").operate("$rename", doc! { "name": "title" }),
            Update::new("b").replace("name", "changed"),
        ])
        .await;
    assert!(matches!(result, Err(AdapterError::Storage(_))));

    let found = adapter.find("user", Some(&[Bson::from("b")]), None).await.unwrap();
    assert_eq!(found.records[0].get("name"), Some(&Bson::from("changed")));
}

#[tokio::test]
async fn delete_selected_or_all() {
    let adapter = connected(AdapterConfig::new()).await;
    adapter
        .create("user", vec![Record::with_id("a"), Record::with_id("b"), Record::with_id("c")])
        .await
        .unwrap();

    let removed = adapter
        .delete("user", Some(&[Bson::from("a"), Bson::from("z")]))
        .await
        .unwrap();
    assert_eq!(removed, 1);

    assert_eq!(adapter.delete("user", None).await.unwrap(), 2);
    assert_eq!(adapter.find("user", None, None).await.unwrap().count, 0);
}

#[tokio::test]
async fn unknown_record_types_are_rejected() {
    let adapter = connected(AdapterConfig::new()).await;

    assert!(matches!(
        adapter.find("training", None, None).await,
        Err(AdapterError::UnknownRecordType(_))
    ));
    assert!(matches!(
        adapter.create("training", vec![Record::new()]).await,
        Err(AdapterError::UnknownRecordType(_))
    ));
}

#[tokio::test]
async fn type_map_selects_the_collection() {
    init_tracing();
    let connector = InMemoryConnector::new();
    let store = connector.store().clone();
    let adapter = Adapter::new(schema(), connector);
    adapter
        .connect(AdapterConfig::new().url("memory://").map_type("vocabulary", "words"))
        .await
        .unwrap();

    adapter
        .create("vocabulary", vec![Record::with_id("a").with("name", "casa")])
        .await
        .unwrap();

    assert_eq!(store.count_documents("words", None, None).await.unwrap(), 1);
    assert_eq!(store.count_documents("vocabulary", None, None).await.unwrap(), 0);
}

#[tokio::test]
async fn connection_lifecycle() {
    init_tracing();
    let adapter = Adapter::new(schema(), InMemoryConnector::new());

    assert!(matches!(
        adapter.connect(AdapterConfig::new()).await,
        Err(AdapterError::Configuration(_))
    ));
    assert!(matches!(
        adapter.connect(AdapterConfig::new().url("  ")).await,
        Err(AdapterError::Configuration(_))
    ));
    assert!(matches!(
        adapter.create("user", vec![Record::new()]).await,
        Err(AdapterError::NotConnected)
    ));

    adapter.connect(AdapterConfig::new().url("memory://")).await.unwrap();
    assert!(adapter.is_connected().await);
    assert!(matches!(
        adapter.connect(AdapterConfig::new().url("memory://")).await,
        Err(AdapterError::Configuration(_))
    ));

    adapter.create("user", vec![Record::with_id("ana")]).await.unwrap();

    adapter.disconnect().await.unwrap();
    assert!(!adapter.is_connected().await);
    assert!(matches!(adapter.disconnect().await, Err(AdapterError::NotConnected)));
    assert!(matches!(adapter.delete("user", None).await, Err(AdapterError::NotConnected)));

    // The connector keeps its data across connections.
    adapter.connect(AdapterConfig::new().url("memory://")).await.unwrap();
    assert_eq!(adapter.find("user", None, None).await.unwrap().count, 1);
}

#[tokio::test]
async fn transactions_roll_back_when_enabled() {
    let adapter = connected(AdapterConfig::new().enable_transactions(true)).await;
    adapter.create("user", vec![Record::with_id("ana")]).await.unwrap();

    let transaction = adapter.begin_transaction().await.unwrap();
    assert!(transaction.is_isolated());

    transaction.create("user", vec![Record::with_id("leo")]).await.unwrap();
    transaction.delete("user", Some(&[Bson::from("ana")])).await.unwrap();

    // Writes are visible inside the session only.
    assert_eq!(
        transaction.find("user", None, None).await.unwrap().records,
        vec![Record::with_id("leo")]
    );
    assert_eq!(
        adapter.find("user", None, None).await.unwrap().records,
        vec![Record::with_id("ana")]
    );

    let error = AdapterError::Storage("validation failed".into());
    assert_eq!(transaction.abort(&error).await.unwrap(), TransactionState::Aborted);

    assert_eq!(
        adapter.find("user", None, None).await.unwrap().records,
        vec![Record::with_id("ana")]
    );
}

#[tokio::test]
async fn transactions_commit_when_enabled() {
    let adapter = connected(AdapterConfig::new().enable_transactions(true)).await;

    let transaction = adapter.begin_transaction().await.unwrap();
    transaction.create("user", vec![Record::with_id("ana").with("name", "ana")]).await.unwrap();
    transaction
        .update("user", vec![Update::new("ana").replace("name", "Ana")])
        .await
        .unwrap();
    assert_eq!(transaction.finalize(None).await.unwrap(), TransactionState::Committed);

    let found = adapter.find("user", None, None).await.unwrap();
    assert_eq!(names(&found.records), vec!["Ana"]);
}

#[tokio::test]
async fn dropped_transactions_discard_their_writes() {
    let adapter = connected(AdapterConfig::new().enable_transactions(true)).await;

    {
        let transaction = adapter.begin_transaction().await.unwrap();
        transaction.create("user", vec![Record::with_id("ana")]).await.unwrap();
    }

    assert_eq!(adapter.find("user", None, None).await.unwrap().count, 0);
}

#[tokio::test]
async fn transactions_pass_through_when_disabled() {
    let adapter = connected(AdapterConfig::new()).await;
    adapter
        .create("user", vec![Record::with_id("ana"), Record::with_id("leo")])
        .await
        .unwrap();

    let transaction = adapter.begin_transaction().await.unwrap();
    assert!(!transaction.is_isolated());

    transaction.create("user", vec![Record::with_id("eva")]).await.unwrap();
    assert_eq!(transaction.delete("user", Some(&[Bson::from("ana")])).await.unwrap(), 1);

    let error = AdapterError::Storage("validation failed".into());
    assert_eq!(transaction.abort(&error).await.unwrap(), TransactionState::Aborted);

    // Nothing to roll back: every call was durable on its own.
    let found = adapter
        .find("user", None, Some(&QueryOptions::new().sort("id", SortDirection::Asc)))
        .await
        .unwrap();
    assert_eq!(
        found.records.iter().map(id_of).collect::<Vec<_>>(),
        vec![Bson::from("eva"), Bson::from("leo")]
    );
}

#[tokio::test]
async fn transactions_require_a_connection() {
    init_tracing();
    let adapter = Adapter::new(schema(), InMemoryConnector::new());

    assert!(matches!(
        adapter.begin_transaction().await,
        Err(AdapterError::NotConnected)
    ));
}
