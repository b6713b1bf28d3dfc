// src/handlers/mod.rs
// DOCUMENTATION: Handlers module organization
// PURPOSE: Re-export handler components

pub mod associations;
pub mod categories;
pub mod health;
pub mod images;
pub mod upload;
pub mod users;

pub use associations::config as associations_config;
pub use categories::config as categories_config;
pub use health::config as health_config;
pub use images::config as images_config;
pub use users::config as users_config;

/// Every resource under /api
pub fn api_config(cfg: &mut actix_web::web::ServiceConfig) {
    cfg.service(
        actix_web::web::scope("/api")
            .configure(users_config)
            .configure(categories_config)
            .configure(images_config)
            .configure(associations_config),
    );
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use actix_web::dev::{ServiceFactory, ServiceRequest};
    use actix_web::{web, App};
    use tempfile::TempDir;

    use crate::config::{Config, StorageBackend};
    use crate::db::{EntityStore, MemoryStore};
    use crate::services::{BlobStore, LocalBlobStore};

    const BOUNDARY: &str = "----image-service-test-boundary";

    /// Application state backed by a MemoryStore and a temp upload directory
    pub struct TestState {
        pub store: MemoryStore,
        store_data: web::Data<dyn EntityStore>,
        blob_data: web::Data<dyn BlobStore>,
        config: web::Data<Config>,
        dir: TempDir,
    }

    impl TestState {
        pub async fn new() -> Self {
            let dir = TempDir::new().unwrap();
            let store = MemoryStore::new();
            let blobs = LocalBlobStore::open(dir.path()).await.unwrap();

            let store_arc: Arc<dyn EntityStore> = Arc::new(store.clone());
            let blob_arc: Arc<dyn BlobStore> = Arc::new(blobs);

            let config = Config {
                database_url: String::new(),
                server_address: "127.0.0.1".to_string(),
                server_port: 0,
                environment: "test".to_string(),
                log_level: "debug".to_string(),
                storage_backend: StorageBackend::Memory,
                storage_backend_raw: None,
                upload_dir: dir.path().display().to_string(),
                max_upload_bytes: 64 * 1024,
                db_max_connections: 1,
                db_connection_timeout: 1,
            };

            TestState {
                store,
                store_data: web::Data::from(store_arc),
                blob_data: web::Data::from(blob_arc),
                config: web::Data::new(config),
                dir,
            }
        }

        pub fn apply<T>(&self, app: App<T>) -> App<T>
        where
            T: ServiceFactory<
                ServiceRequest,
                Config = (),
                Error = actix_web::Error,
                InitError = (),
            >,
        {
            app.app_data(self.store_data.clone())
                .app_data(self.blob_data.clone())
                .app_data(self.config.clone())
        }

        pub fn max_upload_bytes(&self) -> usize {
            self.config.max_upload_bytes
        }

        /// Number of files currently in the upload directory
        pub fn stored_files(&self) -> usize {
            std::fs::read_dir(self.dir.path()).unwrap().count()
        }
    }

    /// One part of a hand-built multipart/form-data body
    pub enum Part<'a> {
        Text {
            name: &'a str,
            value: &'a str,
        },
        File {
            name: &'a str,
            filename: &'a str,
            content_type: &'a str,
            bytes: &'a [u8],
        },
    }

    impl<'a> Part<'a> {
        pub fn text(name: &'a str, value: &'a str) -> Self {
            Part::Text { name, value }
        }

        pub fn file(
            name: &'a str,
            filename: &'a str,
            content_type: &'a str,
            bytes: &'a [u8],
        ) -> Self {
            Part::File {
                name,
                filename,
                content_type,
                bytes,
            }
        }
    }

    /// Content-Type header value and body for `parts`
    pub fn multipart_body(parts: &[Part<'_>]) -> (String, Vec<u8>) {
        let mut body = Vec::new();
        for part in parts {
            body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
            match part {
                Part::Text { name, value } => {
                    body.extend_from_slice(
                        format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name)
                            .as_bytes(),
                    );
                    body.extend_from_slice(value.as_bytes());
                }
                Part::File {
                    name,
                    filename,
                    content_type,
                    bytes,
                } => {
                    body.extend_from_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                            name, filename, content_type
                        )
                        .as_bytes(),
                    );
                    body.extend_from_slice(bytes);
                }
            }
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

        (format!("multipart/form-data; boundary={}", BOUNDARY), body)
    }
}
