// Tour accessor: catalog listing, detail lookup and back-office CRUD

use serde_json::json;
use tracing::info;

use crate::{
    catalog::{self, FilterCriteria, SortOrder},
    models::{EntityId, Tour},
    repository::{AccessError, Repository, Synced},
};

#[derive(Clone)]
pub struct TourService {
    repo: Repository<Tour>,
}

impl TourService {
    pub fn new(repo: Repository<Tour>) -> Self {
        Self { repo }
    }

    pub fn repository(&self) -> &Repository<Tour> {
        &self.repo
    }

    pub async fn list_tours(&self) -> Result<Synced<Vec<Tour>>, AccessError> {
        self.repo.list().await
    }

    // Catalog page: fetch everything, then filter and sort client side
    pub async fn search_tours(
        &self,
        criteria: &FilterCriteria,
        order: SortOrder,
    ) -> Result<Synced<Vec<Tour>>, AccessError> {
        let all = self.repo.list().await?;
        Ok(all.map(|tours| catalog::search_tours(&tours, criteria, order)))
    }

    // Highest rated first, for the landing page
    pub async fn featured_tours(&self, limit: usize) -> Result<Synced<Vec<Tour>>, AccessError> {
        let all = self.repo.list().await?;
        Ok(all.map(|mut tours| {
            catalog::sort_tours(&mut tours, SortOrder::Rating);
            tours.truncate(limit);
            tours
        }))
    }

    pub async fn get_tour(&self, id: &EntityId) -> Result<Synced<Tour>, AccessError> {
        self.repo.get(id).await
    }

    pub async fn create_tour(&self, mut tour: Tour) -> Result<Synced<Tour>, AccessError> {
        tour.id = None;
        let created = self.repo.create(tour).await?;
        info!(id = ?created.data.id, source = ?created.source, "tour created");
        Ok(created)
    }

    pub async fn update_tour(&self, id: &EntityId, tour: Tour) -> Result<Synced<Tour>, AccessError> {
        self.repo.update(id, tour).await
    }

    pub async fn set_discount(&self, id: &EntityId, discount: f64) -> Result<Synced<Tour>, AccessError> {
        let discount = discount.clamp(0.0, 100.0);
        self.repo
            .patch(id, json!({ "discount": discount }))
            .await
    }

    pub async fn delete_tour(&self, id: &EntityId) -> Result<Synced<()>, AccessError> {
        self.repo.delete(id).await
    }
}
