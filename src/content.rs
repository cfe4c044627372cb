// Site content accessor: about and contact pages plus the blog

use chrono::Utc;
use tracing::info;

use crate::{
    catalog::sort_newest_first,
    models::{AboutContent, BlogPost, ContactContent, EntityId},
    repository::{AccessError, DocumentStore, Repository, Synced},
};

#[derive(Clone)]
pub struct ContentService {
    about: DocumentStore<AboutContent>,
    contact: DocumentStore<ContactContent>,
    posts: Repository<BlogPost>,
}

impl ContentService {
    pub fn new(
        about: DocumentStore<AboutContent>,
        contact: DocumentStore<ContactContent>,
        posts: Repository<BlogPost>,
    ) -> Self {
        Self { about, contact, posts }
    }

    pub async fn about(&self) -> Result<Synced<AboutContent>, AccessError> {
        self.about.read_or_default().await
    }

    pub async fn update_about(&self, content: AboutContent) -> Result<Synced<AboutContent>, AccessError> {
        self.about.write(content).await
    }

    pub async fn contact(&self) -> Result<Synced<ContactContent>, AccessError> {
        self.contact.read_or_default().await
    }

    pub async fn update_contact(&self, content: ContactContent) -> Result<Synced<ContactContent>, AccessError> {
        self.contact.write(content).await
    }

    // Newest first
    pub async fn list_posts(&self) -> Result<Synced<Vec<BlogPost>>, AccessError> {
        let posts = self.posts.list().await?;
        Ok(posts.map(|mut posts| {
            sort_newest_first(&mut posts);
            posts
        }))
    }

    pub async fn get_post(&self, id: &EntityId) -> Result<Synced<BlogPost>, AccessError> {
        self.posts.get(id).await
    }

    pub async fn create_post(&self, mut post: BlogPost) -> Result<Synced<BlogPost>, AccessError> {
        post.id = None;
        if post.published_at.is_none() {
            post.published_at = Some(Utc::now());
        }
        let created = self.posts.create(post).await?;
        info!(id = ?created.data.id, title = %created.data.title, "blog post created");
        Ok(created)
    }

    pub async fn update_post(&self, id: &EntityId, post: BlogPost) -> Result<Synced<BlogPost>, AccessError> {
        self.posts.update(id, post).await
    }

    pub async fn delete_post(&self, id: &EntityId) -> Result<Synced<()>, AccessError> {
        self.posts.delete(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local_mirror::LocalMirror;
    use crate::models::Collection;
    use crate::remote::{
        mock_server::{MockServer, ServerMode},
        ClientConfig, RestClient,
    };
    use crate::repository::{DataSource, StorageStrategy};
    use serde_json::json;
    use std::sync::Arc;

    fn setup() -> (Arc<MockServer>, ContentService) {
        let server = Arc::new(MockServer::new());
        let client = RestClient::new(ClientConfig::default(), server.clone());
        let mirror = LocalMirror::in_memory();
        let service = ContentService::new(
            DocumentStore::new(client.clone(), mirror.clone(), Collection::About, None, StorageStrategy::Layered),
            DocumentStore::new(client.clone(), mirror.clone(), Collection::Contact, None, StorageStrategy::Layered),
            Repository::layered(&client, &mirror),
        );
        (server, service)
    }

    #[tokio::test]
    async fn test_missing_pages_default_to_empty() {
        let (_server, service) = setup();
        let about = service.about().await.unwrap();
        assert_eq!(about.source, DataSource::Empty);
        assert_eq!(about.data, AboutContent::default());
    }

    #[tokio::test]
    async fn test_contact_write_through_then_offline_read() {
        let (server, service) = setup();
        server
            .add_document("contact", json!({"address": "1 Harbour St", "phone": "+212 5"}))
            .await;

        let mut contact = service.contact().await.unwrap().into_inner();
        contact.email = "hello@agency.test".to_string();
        let saved = service.update_contact(contact).await.unwrap();
        assert_eq!(saved.source, DataSource::Remote);
        assert_eq!(server.document("contact").await.unwrap()["email"], "hello@agency.test");

        server.set_mode(ServerMode::CompleteOutage);
        let offline = service.contact().await.unwrap();
        assert_eq!(offline.source, DataSource::Mirror);
        assert_eq!(offline.data.address, "1 Harbour St");
        assert_eq!(offline.data.email, "hello@agency.test");
    }

    #[tokio::test]
    async fn test_posts_listed_newest_first() {
        let (_server, service) = setup();
        for title in ["First", "Second", "Third"] {
            service
                .create_post(BlogPost {
                    title: title.to_string(),
                    ..Default::default()
                })
                .await
                .unwrap();
        }

        let posts = service.list_posts().await.unwrap();
        let titles: Vec<&str> = posts.data.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["Third", "Second", "First"]);
        assert!(posts.data.iter().all(|p| p.published_at.is_some()));

        let id = posts.data[0].id.clone().unwrap();
        let mut edited = service.get_post(&id).await.unwrap().into_inner();
        edited.excerpt = "Updated".to_string();
        service.update_post(&id, edited).await.unwrap();
        assert_eq!(service.get_post(&id).await.unwrap().data.excerpt, "Updated");

        service.delete_post(&id).await.unwrap();
        assert_eq!(service.list_posts().await.unwrap().data.len(), 2);
    }
}
