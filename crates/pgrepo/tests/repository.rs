//! End-to-end repository scenarios against a live database.
//!
//! Skipped unless `DATABASE_URL` is set (a `.env` file is honoured).

use pgrepo::{
    Audit, ColumnValueMap, DirectProvider, FromRow, Params, PoolProvider, RepoConfig, RepoError,
    RepoResult, Repository, RowExt,
};
use std::time::{SystemTime, UNIX_EPOCH};

const PERSON_COLUMNS: &str = r#"
    "Id" SERIAL PRIMARY KEY,
    "Name" TEXT NOT NULL UNIQUE,
    "Age" INT,
    "Deleted" SMALLINT NOT NULL DEFAULT 0,
    "Creator" INT,
    "Updater" INT,
    "UpdateTime" TIMESTAMP
"#;

#[derive(Debug)]
struct Person {
    id: i32,
    name: String,
    age: Option<i32>,
    deleted: i16,
    creator: Option<i32>,
    updater: Option<i32>,
}

impl FromRow for Person {
    fn from_row(row: &tokio_postgres::Row) -> RepoResult<Self> {
        Ok(Self {
            id: row.try_get_column("Id")?,
            name: row.try_get_column("Name")?,
            age: row.try_get_column("Age")?,
            deleted: row.try_get_column("Deleted")?,
            creator: row.try_get_column("Creator")?,
            updater: row.try_get_column("Updater")?,
        })
    }
}

struct Fixture {
    repo: Repository<PoolProvider>,
    table: String,
}

impl Fixture {
    /// Create a uniquely named table, or `None` when no database is configured.
    async fn create(prefix: &str, columns: &str) -> RepoResult<Option<Self>> {
        dotenvy::dotenv().ok();
        let config = match RepoConfig::from_env() {
            Ok(config) => config,
            Err(_) => {
                eprintln!("DATABASE_URL is not set; skipping {prefix}");
                return Ok(None);
            }
        };
        let repo = Repository::from_config(&config)?;

        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock before UNIX_EPOCH")
            .as_nanos();
        let table = format!("{prefix}_{}_{nanos}", std::process::id());
        let rendered = repo.render_table(table.as_str())?;
        repo.execute_sql(&format!("CREATE TABLE {rendered} ({columns})"), &Params::new())
            .await?;
        Ok(Some(Self { repo, table }))
    }

    async fn count(&self) -> RepoResult<i64> {
        let sql = format!("SELECT count(*) FROM {}", self.repo.render_table(self.table.as_str())?);
        let (count,): (i64,) = self
            .repo
            .get_one_sql(&sql, &Params::new())
            .await?
            .ok_or_else(|| RepoError::validation("count returned no row"))?;
        Ok(count)
    }

    async fn drop_table(self) -> RepoResult<()> {
        let rendered = self.repo.render_table(self.table.as_str())?;
        self.repo
            .execute_sql(&format!("DROP TABLE IF EXISTS {rendered}"), &Params::new())
            .await?;
        Ok(())
    }
}

fn person(name: &str, age: i32) -> ColumnValueMap {
    ColumnValueMap::new()
        .set("Name", name.to_string())
        .set("Age", age)
}

#[tokio::test]
async fn add_one_then_get_one() -> RepoResult<()> {
    let Some(fx) = Fixture::create("Person", PERSON_COLUMNS).await? else {
        return Ok(());
    };

    let id = fx
        .repo
        .add_one(&person("X", 5), fx.table.as_str(), Some("Id"), Some(&Audit::by(42_i32)))
        .await?
        .expect("generated id");

    let found: Option<Person> = fx
        .repo
        .get_one(
            fx.table.as_str(),
            r#""Id" = @Id"#,
            &Params::new().bind("Id", id as i32),
            "",
        )
        .await?;
    let found = found.expect("inserted row");
    assert_eq!(found.id as i64, id);
    assert_eq!(found.name, "X");
    assert_eq!(found.age, Some(5));
    assert_eq!(found.deleted, 0);
    assert_eq!(found.creator, Some(42));

    fx.drop_table().await
}

#[tokio::test]
async fn delete_one_keeps_the_row_flagged() -> RepoResult<()> {
    let Some(fx) = Fixture::create("PersonDelete", PERSON_COLUMNS).await? else {
        return Ok(());
    };

    let id = fx
        .repo
        .add_one(&person("Y", 30), fx.table.as_str(), Some("Id"), None)
        .await?
        .expect("generated id") as i32;

    let affected = fx
        .repo
        .delete_one(id, fx.table.as_str(), "Id", Some(&Audit::by(7_i32)))
        .await?;
    assert_eq!(affected, 1);
    assert_eq!(fx.count().await?, 1);

    let row: Person = fx
        .repo
        .get_one(fx.table.as_str(), r#""Id" = @Id"#, &Params::new().bind("Id", id), "")
        .await?
        .expect("row still present");
    assert_eq!(row.deleted, 1);
    assert_eq!(row.updater, Some(7));

    let stamped = fx
        .repo
        .has_exists_with_param(
            &format!(
                r#"SELECT 1 FROM {} WHERE "Id" = @Id AND "UpdateTime" IS NOT NULL"#,
                fx.repo.render_table(fx.table.as_str())?
            ),
            &Params::new().bind("Id", id),
        )
        .await?;
    assert!(stamped);

    fx.drop_table().await
}

#[tokio::test]
async fn purge_removes_exactly_the_matched_rows() -> RepoResult<()> {
    let Some(fx) = Fixture::create("PersonPurge", PERSON_COLUMNS).await? else {
        return Ok(());
    };

    let inserted = fx
        .repo
        .add_many(&[person("A", 1), person("B", 2), person("C", 3)], fx.table.as_str(), None)
        .await?;
    assert_eq!(inserted, 3);

    let purged = fx
        .repo
        .purge_by_where(fx.table.as_str(), r#""Age" > @Age"#, &Params::new().bind("Age", 1_i32))
        .await?;
    assert_eq!(purged, 2);
    assert_eq!(fx.count().await?, 1);

    let purged = fx.repo.purge_one("A".to_string(), fx.table.as_str(), "Name").await?;
    assert_eq!(purged, 1);
    assert_eq!(fx.count().await?, 0);

    fx.drop_table().await
}

#[tokio::test]
async fn failing_add_many_leaves_table_unchanged() -> RepoResult<()> {
    let Some(fx) = Fixture::create("PersonBatch", PERSON_COLUMNS).await? else {
        return Ok(());
    };

    let err = fx
        .repo
        .add_many(&[person("A", 1), person("B", 2), person("A", 3)], fx.table.as_str(), None)
        .await
        .unwrap_err();
    assert!(err.is_unique_violation(), "unexpected error: {err}");
    assert_eq!(fx.count().await?, 0);

    fx.drop_table().await
}

#[tokio::test]
async fn failing_update_many_leaves_rows_unchanged() -> RepoResult<()> {
    let Some(fx) = Fixture::create("PersonUpdate", PERSON_COLUMNS).await? else {
        return Ok(());
    };

    fx.repo
        .add_many(&[person("A", 1), person("B", 2)], fx.table.as_str(), None)
        .await?;

    let rows = vec![
        ColumnValueMap::new().key("Key", "A".to_string()).set("Name", "C".to_string()),
        ColumnValueMap::new().key("Key", "B".to_string()).set("Name", "C".to_string()),
    ];
    let err = fx
        .repo
        .update_many(&rows, fx.table.as_str(), r#""Name" = @Key"#, None)
        .await
        .unwrap_err();
    assert!(err.is_unique_violation(), "unexpected error: {err}");

    let rows: Vec<Person> = fx
        .repo
        .get_all(fx.table.as_str(), "", &Params::new(), r#""Name""#)
        .await?;
    let names: Vec<&str> = rows.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["A", "B"]);

    fx.drop_table().await
}

#[tokio::test]
async fn update_and_list_columns() -> RepoResult<()> {
    let Some(fx) = Fixture::create("PersonList", PERSON_COLUMNS).await? else {
        return Ok(());
    };

    fx.repo
        .add_many(&[person("A", 10), person("B", 10), person("C", 20)], fx.table.as_str(), None)
        .await?;

    let affected = fx
        .repo
        .update_one(
            &ColumnValueMap::new().key("Name", "C".to_string()).set("Age", 10_i32),
            fx.table.as_str(),
            r#""Name" = @Name"#,
            Some(&Audit::by(9_i32)),
        )
        .await?;
    assert_eq!(affected, 1);

    let mut names: Vec<String> = fx
        .repo
        .get_column_as_list(10_i32, fx.table.as_str(), "Age", "Name")
        .await?;
    names.sort();
    assert_eq!(names, vec!["A", "B", "C"]);

    let soft_deleted = fx
        .repo
        .delete_by_where(
            fx.table.as_str(),
            r#""Name" = ANY(@Names)"#,
            &Params::new().bind("Names", vec!["A".to_string(), "B".to_string()]),
            None,
        )
        .await?;
    assert_eq!(soft_deleted, 2);

    let live: Vec<Person> = fx
        .repo
        .get_all(fx.table.as_str(), r#""Deleted" = 0"#, &Params::new(), "")
        .await?;
    assert_eq!(live.len(), 1);
    assert_eq!(live[0].updater, Some(9));

    fx.drop_table().await
}

#[tokio::test]
async fn has_exists_flips_after_insert() -> RepoResult<()> {
    let Some(fx) = Fixture::create("PersonExists", PERSON_COLUMNS).await? else {
        return Ok(());
    };

    assert!(!fx.repo.has_exists(1_i32, fx.table.as_str(), "Id").await?);
    let id = fx
        .repo
        .add_one(&person("Z", 1), fx.table.as_str(), Some("Id"), None)
        .await?
        .expect("generated id") as i32;
    assert!(fx.repo.has_exists(id, fx.table.as_str(), "Id").await?);

    fx.drop_table().await
}

#[tokio::test]
async fn priority_repeat_scoped_by_parent() -> RepoResult<()> {
    let Some(fx) = Fixture::create(
        "Step",
        r#""Id" SERIAL PRIMARY KEY, "ParentId" INT NOT NULL, "Order" INT NOT NULL,
           "Deleted" SMALLINT NOT NULL DEFAULT 0"#,
    )
    .await?
    else {
        return Ok(());
    };

    fx.repo
        .add_one(
            &ColumnValueMap::new().set("ParentId", 1_i32).set("Order", 3_i32),
            fx.table.as_str(),
            None,
            None,
        )
        .await?;

    let scope = r#""ParentId" = @ParentId"#;
    assert!(
        fx.repo
            .priority_repeat(3_i32, fx.table.as_str(), "Order", scope, &Params::new().bind("ParentId", 1_i32))
            .await?
    );
    assert!(
        !fx.repo
            .priority_repeat(3_i32, fx.table.as_str(), "Order", scope, &Params::new().bind("ParentId", 2_i32))
            .await?
    );
    assert!(
        !fx.repo
            .priority_repeat(4_i32, fx.table.as_str(), "Order", "", &Params::new())
            .await?
    );

    fx.drop_table().await
}

#[tokio::test]
async fn caller_marker_named_like_the_priority_value() -> RepoResult<()> {
    let Some(fx) = Fixture::create(
        "StepScope",
        r#""Id" SERIAL PRIMARY KEY, "ParentId" INT NOT NULL, "Order" INT NOT NULL"#,
    )
    .await?
    else {
        return Ok(());
    };

    fx.repo
        .add_one(
            &ColumnValueMap::new().set("ParentId", 1_i32).set("Order", 3_i32),
            fx.table.as_str(),
            None,
            None,
        )
        .await?;

    assert!(
        fx.repo
            .priority_repeat(
                3_i32,
                fx.table.as_str(),
                "Order",
                r#""ParentId" = @Priority"#,
                &Params::new().bind("Priority", 1_i32),
            )
            .await?
    );

    fx.drop_table().await
}

#[tokio::test]
async fn columns_with_spaces_and_non_ascii_names() -> RepoResult<()> {
    let Some(fx) = Fixture::create(
        "MachineNames",
        r#""Id" SERIAL PRIMARY KEY, "Machine Name" TEXT NOT NULL, "名稱" TEXT"#,
    )
    .await?
    else {
        return Ok(());
    };

    let id = fx
        .repo
        .add_one(
            &ColumnValueMap::new()
                .set("Machine Name", "press".to_string())
                .set("名稱", "壓床".to_string()),
            fx.table.as_str(),
            Some("Id"),
            None,
        )
        .await?
        .expect("generated id") as i32;

    fx.repo
        .update_one(
            &ColumnValueMap::new()
                .key("Key", id)
                .set("名稱", "沖床".to_string()),
            fx.table.as_str(),
            r#""Id" = @Key"#,
            None,
        )
        .await?;

    let sql = format!(
        r#"SELECT "Machine Name", "名稱" FROM {} WHERE "Id" = @Id"#,
        fx.repo.render_table(fx.table.as_str())?
    );
    let row: Option<(String, Option<String>)> = fx
        .repo
        .get_one_sql(&sql, &Params::new().bind("Id", id))
        .await?;
    assert_eq!(row, Some(("press".to_string(), Some("沖床".to_string()))));

    fx.drop_table().await
}

#[tokio::test]
async fn direct_provider_reads_on_a_fresh_connection() -> RepoResult<()> {
    let Some(fx) = Fixture::create("PersonDirect", PERSON_COLUMNS).await? else {
        return Ok(());
    };
    fx.repo
        .add_many(&[person("A", 1), person("B", 2)], fx.table.as_str(), None)
        .await?;

    let config = RepoConfig::from_env()?;
    let direct = Repository::new(DirectProvider::from_url(&config.database_url)?)
        .with_schema(config.schema.as_str());

    let sql = format!(
        r#"SELECT "Id", "Name" FROM {} WHERE "Age" >= @Age ORDER BY "Name""#,
        direct.render_table(fx.table.as_str())?
    );
    let rows: Vec<(i32, String)> = direct
        .get_all_sql(&sql, &Params::new().bind("Age", 2_i32))
        .await?;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].1, "B");
    assert!(direct.has_exists(rows[0].0, fx.table.as_str(), "Id").await?);

    fx.drop_table().await
}
