use super::helpers::fetch_driver;
use super::Engine;

use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    api::{DriverAPI, OfferAPI},
    entities::Driver,
    error::{invalid_state_error, Error},
};

#[async_trait]
impl DriverAPI for Engine {
    #[tracing::instrument(skip(self))]
    async fn create_driver(&self, name: String) -> Result<Driver, Error> {
        let driver = Driver::new(name)?;

        self.store.insert_driver(&driver).await?;

        tracing::info!(driver_id = %driver.id, "driver created");

        Ok(driver)
    }

    #[tracing::instrument(skip(self))]
    async fn find_driver(&self, id: Uuid) -> Result<Driver, Error> {
        fetch_driver(self.store.as_ref(), id).await
    }

    #[tracing::instrument(skip(self))]
    async fn start_driver(&self, id: Uuid) -> Result<Driver, Error> {
        let mut driver = fetch_driver(self.store.as_ref(), id).await?;
        let from = driver.status;

        driver.start()?;

        if self.store.set_driver_status(id, from, driver.status).await? == 0 {
            return Err(invalid_state_error("driver status changed concurrently"));
        }

        Ok(driver)
    }

    #[tracing::instrument(skip(self))]
    async fn stop_driver(&self, id: Uuid) -> Result<Driver, Error> {
        let mut driver = fetch_driver(self.store.as_ref(), id).await?;
        let from = driver.status;

        driver.stop()?;

        if self.store.set_driver_status(id, from, driver.status).await? == 0 {
            return Err(invalid_state_error("driver status changed concurrently"));
        }

        let withdrawn = self.withdraw_all_offers(id).await?;

        tracing::info!(withdrawn, "driver went offline");

        Ok(driver)
    }
}
