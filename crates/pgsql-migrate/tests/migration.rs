//! End-to-end migration runs against in-memory source and target.

mod common;

use common::{column, constraint, text, FakeSchema, FakeSource, FakeTable, FakeTarget};
use pgsql_migrate::core::schema::{
    AbstractType, ConstraintKind, IdentityDescriptor, IndexDescriptor, ModuleDefinition, ModuleKind,
    StatisticsDescriptor,
};
use pgsql_migrate::{MigrateError, MigrationConfig, Migrator, NamingPolicy, ObjectKind, SqlValue};
use rust_decimal::Decimal;

const CUSTOMER_ORDERS_VIEW: &str = "CREATE VIEW [dbo].[vCustomerOrders] AS SELECT c.[FullName] AS 'Name', o.[OrderId] \
     FROM [dbo].[Customers] c JOIN [dbo].[Orders] o ON o.[CustomerId] = c.[Id]";

// =============================================================================
// Fixtures
// =============================================================================

fn customers() -> FakeTable {
    let mut created_at = constraint("dbo", "Customers", "DF_Customers_CreatedAt", ConstraintKind::Default, &["CreatedAt"]);
    created_at.definition = Some("(getdate())".to_string());
    created_at.value_type = Some(AbstractType::DateTime);

    FakeTable {
        name: "Customers".to_string(),
        columns: vec![
            column("Id", AbstractType::Int32, "int", Some(10)).not_null(),
            column("FullName", AbstractType::String, "nvarchar", Some(100)).not_null(),
            column("CreatedAt", AbstractType::DateTime, "datetime", None),
        ],
        rows: vec![
            vec![SqlValue::I32(1), text("Ada"), SqlValue::Null],
            vec![SqlValue::I32(2), text("Grace\0Hopper"), SqlValue::Null],
        ],
        primary_key: Some(constraint("dbo", "Customers", "PK_Customers", ConstraintKind::PrimaryKey, &["Id"])),
        defaults: vec![created_at],
        identities: vec![IdentityDescriptor {
            schema: "dbo".to_string(),
            table_name: "Customers".to_string(),
            column_name: "Id".to_string(),
            seed_value: 1,
            seed_increment: 1,
            last_observed_value: Some(2),
        }],
        ..Default::default()
    }
}

fn orders() -> FakeTable {
    let mut fk = constraint("dbo", "Orders", "FK_Orders_Customers", ConstraintKind::ForeignKey, &["CustomerId"]);
    fk.referenced_schema = Some("dbo".to_string());
    fk.referenced_table = Some("Customers".to_string());
    fk.referenced_fields = vec!["Id".to_string()];
    fk.on_delete_action = Some("CASCADE".to_string());
    fk.on_update_action = Some("NO_ACTION".to_string());

    let mut total = column("Total", AbstractType::Decimal, "decimal", Some(10));
    total.precision = Some(2);

    FakeTable {
        name: "Orders".to_string(),
        columns: vec![
            column("OrderId", AbstractType::Int32, "int", Some(10)).not_null(),
            column("CustomerId", AbstractType::Int32, "int", Some(10)).not_null(),
            total,
        ],
        rows: vec![
            vec![SqlValue::I32(10), SqlValue::I32(1), SqlValue::Decimal(Decimal::new(1999, 2))],
            vec![SqlValue::I32(11), SqlValue::I32(1), SqlValue::Decimal(Decimal::new(500, 2))],
            vec![SqlValue::I32(12), SqlValue::I32(2), SqlValue::Null],
        ],
        primary_key: Some(constraint("dbo", "Orders", "PK_Orders", ConstraintKind::PrimaryKey, &["OrderId"])),
        foreign_keys: vec![fk],
        ..Default::default()
    }
}

fn index(table: &str, name: &str, keys: &[&str], included: &[&str]) -> IndexDescriptor {
    IndexDescriptor {
        schema: "dbo".to_string(),
        table_name: table.to_string(),
        index_name: name.to_string(),
        key_columns: keys.iter().map(|k| k.to_string()).collect(),
        included_columns: included.iter().map(|k| k.to_string()).collect(),
        is_unique: false,
    }
}

fn view(schema: &str, name: &str, definition: &str) -> ModuleDefinition {
    ModuleDefinition {
        schema: schema.to_string(),
        name: name.to_string(),
        definition: definition.to_string(),
        kind: ModuleKind::View,
    }
}

fn dbo() -> FakeSchema {
    FakeSchema {
        name: "dbo".to_string(),
        tables: vec![customers(), orders()],
        indexes: vec![
            index("Customers", "IX_Name", &["FullName"], &[]),
            index("Orders", "IX_Name", &["CustomerId"], &["Total"]),
        ],
        statistics: vec![StatisticsDescriptor {
            schema: "dbo".to_string(),
            table_name: "Orders".to_string(),
            name: "_WA_Sys_00000003_Orders".to_string(),
            columns: vec!["Total".to_string()],
        }],
        modules: vec![view("dbo", "vCustomerOrders", CUSTOMER_ORDERS_VIEW)],
    }
}

fn archive() -> FakeSchema {
    FakeSchema {
        name: "Archive".to_string(),
        tables: vec![FakeTable {
            name: "OldOrders".to_string(),
            columns: vec![column("OrderId", AbstractType::Int32, "int", Some(10)).not_null()],
            rows: vec![vec![SqlValue::I32(1)], vec![SqlValue::I32(2)]],
            ..Default::default()
        }],
        ..Default::default()
    }
}

fn archive_with_view() -> FakeSchema {
    FakeSchema {
        modules: vec![view(
            "Archive",
            "RecentOrders",
            "CREATE VIEW [Archive].[RecentOrders] AS SELECT o.[OrderId] FROM [Archive].[OldOrders] o",
        )],
        ..archive()
    }
}

fn sample_source() -> FakeSource {
    let sales = FakeSchema {
        name: "Sales".to_string(),
        ..Default::default()
    };
    FakeSource::new(vec![dbo(), sales, archive()])
}

fn sample_config() -> MigrationConfig {
    MigrationConfig {
        skip_data_for_tables: vec!["archive.oldorders".to_string()],
        ..Default::default()
    }
}

// =============================================================================
// Full run
// =============================================================================

#[tokio::test]
async fn test_full_migration() {
    let source = sample_source();
    let cursors = source.cursors.clone();
    let target = FakeTarget::new();
    let log = target.log.clone();

    let report = Migrator::new(sample_config(), source, target).run().await.unwrap();

    assert_eq!(report.schemas, vec!["public".to_string(), "archive".to_string()]);
    assert_eq!(report.rows_transferred(), 5);
    assert!(report.skipped_modules.is_empty());

    let tables: Vec<_> = report
        .tables
        .iter()
        .map(|t| (t.schema.as_str(), t.table.as_str(), t.rows))
        .collect();
    assert_eq!(
        tables,
        vec![
            ("public", "customers", Some(2)),
            ("public", "orders", Some(3)),
            ("archive", "old_orders", None),
        ]
    );

    // skipped data is never read
    let cursors = cursors.lock().unwrap();
    assert_eq!(cursors.len(), 2);
    assert!(cursors.iter().all(|sql| !sql.contains("[Archive]")));

    let log = log.lock().unwrap();
    // batch size 1: one commit per row plus the final one per copied table
    assert_eq!(log.commits, 7);
    assert_eq!(log.committed.len(), 5);
    assert_eq!(
        log.committed[0].0,
        "INSERT INTO \"public\".\"customers\" (\"id\", \"full_name\", \"created_at\") \
         VALUES ($1::integer, $2::varchar(100), $3::timestamp)"
    );
    assert_eq!(
        log.committed[1].1,
        vec![SqlValue::I32(2), text("GraceHopper"), SqlValue::Null]
    );

    assert_eq!(log.count("CREATE SCHEMA"), 2);
    assert!(log.position("CREATE SCHEMA IF NOT EXISTS \"public\"").is_some());
    assert!(log.position("CREATE SCHEMA IF NOT EXISTS \"sales\"").is_none());
    assert!(log
        .statements
        .contains(&"CREATE TABLE \"public\".\"orders\" (\n    \"order_id\" integer NOT NULL,\n    \"customer_id\" integer NOT NULL,\n    \"total\" decimal(10,2) NULL\n)".to_string()));
}

#[tokio::test]
async fn test_constraints_and_identity() {
    let target = FakeTarget::new();
    let log = target.log.clone();

    Migrator::new(sample_config(), sample_source(), target).run().await.unwrap();

    let log = log.lock().unwrap();
    let statements = &log.statements;
    for expected in [
        "ALTER TABLE \"public\".\"customers\" ADD CONSTRAINT \"pk_customers\" PRIMARY KEY (\"id\")",
        "ALTER TABLE \"public\".\"customers\" ALTER COLUMN \"created_at\" SET DEFAULT now()",
        "ALTER TABLE \"public\".\"customers\" ALTER COLUMN \"id\" ADD GENERATED BY DEFAULT AS IDENTITY \
         (START WITH 3 INCREMENT BY 1)",
        "ALTER TABLE \"public\".\"orders\" ADD CONSTRAINT \"fk_orders_customers\" FOREIGN KEY (\"customer_id\") \
         REFERENCES \"public\".\"customers\" (\"id\") ON DELETE CASCADE ON UPDATE NO ACTION",
    ] {
        assert!(statements.iter().any(|s| s == expected), "missing: {expected}");
    }

    // keys are added once the rows are in; foreign keys wait for every table
    let create_customers = log.position("CREATE TABLE \"public\".\"customers\"").unwrap();
    let pk_customers = log.position("ALTER TABLE \"public\".\"customers\" ADD CONSTRAINT").unwrap();
    let create_archive = log.position("CREATE TABLE \"archive\".\"old_orders\"").unwrap();
    let fk = log
        .position("ALTER TABLE \"public\".\"orders\" ADD CONSTRAINT \"fk_orders_customers\"")
        .unwrap();
    assert!(create_customers < pk_customers);
    assert!(create_archive < fk);
    assert_eq!(log.count("DROP TABLE IF EXISTS"), 3);
}

#[tokio::test]
async fn test_colliding_index_names_are_suffixed() {
    let target = FakeTarget::new();
    let log = target.log.clone();

    Migrator::new(sample_config(), sample_source(), target).run().await.unwrap();

    let log = log.lock().unwrap();
    assert_eq!(log.count("CREATE INDEX"), 3);
    for expected in [
        "CREATE INDEX \"ix_name1\" ON \"public\".\"customers\" (\"full_name\")",
        "CREATE INDEX \"ix_name2\" ON \"public\".\"orders\" (\"customer_id\") INCLUDE (\"total\")",
        "CREATE INDEX \"_wa_sys_00000003_orders\" ON \"public\".\"orders\" (\"total\")",
    ] {
        assert!(log.statements.iter().any(|s| s == expected), "missing: {expected}");
    }
}

#[tokio::test]
async fn test_views_are_rewritten_with_ledger_names() {
    let target = FakeTarget::new();
    let log = target.log.clone();

    let report = Migrator::new(sample_config(), sample_source(), target).run().await.unwrap();

    let log = log.lock().unwrap();
    let drop = log.position("DROP VIEW IF EXISTS \"public\".\"v_customer_orders\"").unwrap();
    let create = log
        .statements
        .iter()
        .position(|s| {
            s == "CREATE VIEW public.v_customer_orders AS SELECT c.full_name AS \"Name\", o.order_id \
                  FROM public.customers c JOIN public.orders o ON o.customer_id = c.id"
        })
        .unwrap();
    assert!(drop < create);
    // views run after every table and foreign key
    assert_eq!(create, log.statements.len() - 1);

    let view = report
        .renamings
        .iter()
        .find(|r| r.kind == ObjectKind::View)
        .unwrap();
    assert_eq!(view.old_name, "vCustomerOrders");
    assert_eq!(view.new_name, "v_customer_orders");
    assert!(view.normalized);
}

#[tokio::test]
async fn test_view_in_mixed_case_schema_uses_translated_schema() {
    let target = FakeTarget::new();
    let log = target.log.clone();

    let config = MigrationConfig {
        schema_only: true,
        ..Default::default()
    };
    let report = Migrator::new(config, FakeSource::new(vec![archive_with_view()]), target)
        .run()
        .await
        .unwrap();

    assert_eq!(report.schemas, vec!["archive".to_string()]);
    assert!(report.skipped_modules.is_empty());

    let log = log.lock().unwrap();
    let drop = log.position("DROP VIEW IF EXISTS \"archive\".\"recent_orders\"").unwrap();
    let create = log
        .statements
        .iter()
        .position(|s| s == "CREATE VIEW archive.recent_orders AS SELECT o.order_id FROM archive.old_orders o")
        .unwrap();
    assert!(drop < create);
}

#[tokio::test]
async fn test_view_in_mixed_case_schema_under_identity_policy() {
    let target = FakeTarget::new();
    let log = target.log.clone();

    let config = MigrationConfig {
        naming_policy: NamingPolicy::Identity,
        schema_only: true,
        ..Default::default()
    };
    let report = Migrator::new(config, FakeSource::new(vec![archive_with_view()]), target)
        .run()
        .await
        .unwrap();

    assert!(report.skipped_modules.is_empty());
    let log = log.lock().unwrap();
    assert!(log.position("DROP VIEW IF EXISTS \"Archive\".\"RecentOrders\"").is_some());
    assert!(log.statements.iter().any(|s| {
        s == "CREATE VIEW \"Archive\".\"RecentOrders\" AS SELECT o.\"OrderId\" FROM \"Archive\".\"OldOrders\" o"
    }));
}

// =============================================================================
// Options
// =============================================================================

#[tokio::test]
async fn test_schema_only_copies_nothing() {
    let source = sample_source();
    let cursors = source.cursors.clone();
    let target = FakeTarget::new();
    let log = target.log.clone();

    let config = MigrationConfig {
        schema_only: true,
        ..Default::default()
    };
    let report = Migrator::new(config, source, target).run().await.unwrap();

    assert!(report.tables.iter().all(|t| t.rows.is_none()));
    assert_eq!(report.rows_transferred(), 0);
    assert!(cursors.lock().unwrap().is_empty());

    let log = log.lock().unwrap();
    assert_eq!(log.commits, 0);
    assert_eq!(log.inserts, 0);
    assert_eq!(log.count("CREATE TABLE"), 3);
}

#[tokio::test]
async fn test_identity_policy_keeps_names() {
    let target = FakeTarget::new();
    let log = target.log.clone();

    let config = MigrationConfig {
        naming_policy: NamingPolicy::Identity,
        schema_only: true,
        ..Default::default()
    };
    let report = Migrator::new(config, FakeSource::new(vec![archive()]), target)
        .run()
        .await
        .unwrap();

    assert_eq!(report.schemas, vec!["Archive".to_string()]);
    let log = log.lock().unwrap();
    assert!(log.position("CREATE TABLE \"Archive\".\"OldOrders\"").is_some());
}

// =============================================================================
// Failures
// =============================================================================

#[tokio::test]
async fn test_failed_view_is_skipped() {
    let target = FakeTarget {
        fail_statements_containing: Some("CREATE VIEW".to_string()),
        ..FakeTarget::new()
    };

    let report = Migrator::new(sample_config(), sample_source(), target).run().await.unwrap();

    assert_eq!(report.skipped_modules.len(), 1);
    let skipped = &report.skipped_modules[0];
    assert_eq!(skipped.schema, "dbo");
    assert_eq!(skipped.name, "vCustomerOrders");
    assert_eq!(skipped.kind, ModuleKind::View);
    assert!(skipped.reason.contains("syntax error"));
    assert_eq!(report.rows_transferred(), 5);
}

#[tokio::test]
async fn test_failed_view_aborts_when_not_skipping() {
    let target = FakeTarget {
        fail_statements_containing: Some("CREATE VIEW".to_string()),
        ..FakeTarget::new()
    };
    let config = MigrationConfig {
        skip_failed_modules: false,
        ..sample_config()
    };

    let err = Migrator::new(config, sample_source(), target).run().await.unwrap_err();
    assert!(matches!(err, MigrateError::Execution { .. }));
}

#[tokio::test]
async fn test_unsupported_column_type_names_the_column() {
    let mut node = column("Node", AbstractType::String, "hierarchyid", None);
    node.abstract_type = None;
    node.is_user_defined_type = true;

    let source = FakeSource::new(vec![FakeSchema {
        name: "dbo".to_string(),
        tables: vec![FakeTable {
            name: "Org".to_string(),
            columns: vec![column("Id", AbstractType::Int32, "int", None), node],
            ..Default::default()
        }],
        ..Default::default()
    }]);
    let target = FakeTarget::new();
    let log = target.log.clone();

    let err = Migrator::new(MigrationConfig::default(), source, target)
        .run()
        .await
        .unwrap_err();

    match err {
        MigrateError::Column {
            schema,
            table,
            column,
            source,
        } => {
            assert_eq!((schema.as_str(), table.as_str(), column.as_str()), ("dbo", "Org", "Node"));
            assert!(matches!(*source, MigrateError::UnsupportedCustomType { .. }));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(log.lock().unwrap().count("CREATE TABLE"), 0);
}

#[tokio::test]
async fn test_ambiguous_reference_aborts_even_when_skipping() {
    // under the identity policy `dbo` names both the schema (-> public) and a table
    let source = FakeSource::new(vec![FakeSchema {
        name: "dbo".to_string(),
        tables: vec![FakeTable {
            name: "dbo".to_string(),
            columns: vec![column("Id", AbstractType::Int32, "int", None)],
            ..Default::default()
        }],
        modules: vec![view("dbo", "v", "CREATE VIEW v AS SELECT * FROM [dbo].[dbo]")],
        ..Default::default()
    }]);
    let config = MigrationConfig {
        naming_policy: NamingPolicy::Identity,
        ..Default::default()
    };
    assert!(config.skip_failed_modules);

    let err = Migrator::new(config, source, FakeTarget::new())
        .run()
        .await
        .unwrap_err();
    assert!(matches!(err, MigrateError::AmbiguousMapping { .. }));
}
