//! Shared fixtures: a small blog database and the config registering it

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use rusqlite::Connection;
use tempfile::TempDir;

pub const USER: &str = r"App\Entity\User";
pub const POST: &str = r"App\Entity\Post";
pub const TAG: &str = r"App\Entity\Tag";

/// Temp directory holding `blog.db` and `config.json`
pub struct Fixture {
    pub dir: TempDir,
    pub database: PathBuf,
    pub config: PathBuf,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let database = dir.path().join("blog.db");
        let config = dir.path().join("config.json");

        create_blog_db(&database);
        std::fs::write(&config, config_json(&database)).expect("Failed to write config");

        Self { dir, database, config }
    }
}

fn create_blog_db(path: &Path) {
    let conn = Connection::open(path).expect("Failed to create temp database");
    conn.execute_batch(
        "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL, created_at DATETIME);
         CREATE TABLE posts (id INTEGER PRIMARY KEY, title TEXT, user_id INTEGER REFERENCES users(id));
         CREATE TABLE tags (id INTEGER PRIMARY KEY, label TEXT);
         CREATE TABLE post_tags (post_id INTEGER, tag_id INTEGER);
         CREATE TABLE settings (key TEXT PRIMARY KEY, value TEXT);
         CREATE TABLE ext_translations (
             id INTEGER PRIMARY KEY, locale TEXT, object_class TEXT,
             field TEXT, foreign_key TEXT, content TEXT
         );
         INSERT INTO users (id, name, created_at) VALUES (1, 'Alice', '2024-01-02 03:04:05'), (2, 'Bob', NULL);
         INSERT INTO posts (id, title, user_id) VALUES (1, 'First', 1), (2, 'Second', 1), (3, 'Orphan', NULL);
         INSERT INTO tags (id, label) VALUES (1, 'rust'), (2, 'sql'), (3, 'cli');
         INSERT INTO post_tags VALUES (1, 3), (1, 1), (2, 2);
         INSERT INTO ext_translations (locale, object_class, field, foreign_key, content)
             VALUES ('de_DE', 'App\\Entity\\Post', 'title', '1', 'Erster'),
                    ('de_DE', 'App\\Entity\\Post', 'title', '2', 'Zweiter');",
    )
    .expect("Failed to create schema");
}

fn config_json(database: &Path) -> String {
    serde_json::json!({
        "database": database,
        "entities": {
            USER: {
                "table": "users",
                "display": "{name}",
                "associations": [
                    { "name": "posts", "kind": "one_to_many", "target": POST, "mapped_by": "user_id" }
                ]
            },
            POST: {
                "table": "posts",
                "display": "{title}",
                "translatable": ["title"],
                "associations": [
                    { "name": "author", "kind": "many_to_one", "target": USER, "join_column": "user_id" },
                    {
                        "name": "tags", "kind": "many_to_many", "target": TAG,
                        "join_table": { "name": "post_tags", "join_column": "post_id", "inverse_join_column": "tag_id" }
                    }
                ]
            },
            TAG: { "table": "tags", "display": "#{label}" }
        }
    })
    .to_string()
}
