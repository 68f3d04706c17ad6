//! Delivery - uniform view over the four collaborator traits
//!
//! `OutputHandle` drives any `Delivery`; one adapter per collaborator role
//! maps the role's write method onto `deliver`.

use std::future::Future;

use contracts::{
    Alert, AlertTransport, ContractError, FeatureInsert, FeatureSink, MisfitRecord, MisfitSink,
    Publication, Publisher,
};

/// Something a worker task can hand items to
pub trait Delivery: Send + 'static {
    /// Item type accepted by this output
    type Item: Send + Sync + 'static;

    fn name(&self) -> &str;

    fn deliver(
        &mut self,
        item: &Self::Item,
    ) -> impl Future<Output = Result<(), ContractError>> + Send;

    fn flush(&mut self) -> impl Future<Output = Result<(), ContractError>> + Send;

    fn close(&mut self) -> impl Future<Output = Result<(), ContractError>> + Send;
}

macro_rules! delivery_adapter {
    ($adapter:ident, $bound:ident, $item:ty, $write:ident) => {
        #[doc = concat!("Delivers through [`", stringify!($bound), "`]")]
        pub struct $adapter<S>(pub S);

        impl<S: $bound + 'static> Delivery for $adapter<S> {
            type Item = $item;

            fn name(&self) -> &str {
                $bound::name(&self.0)
            }

            fn deliver(
                &mut self,
                item: &Self::Item,
            ) -> impl Future<Output = Result<(), ContractError>> + Send {
                $bound::$write(&mut self.0, item)
            }

            fn flush(&mut self) -> impl Future<Output = Result<(), ContractError>> + Send {
                $bound::flush(&mut self.0)
            }

            fn close(&mut self) -> impl Future<Output = Result<(), ContractError>> + Send {
                $bound::close(&mut self.0)
            }
        }
    };
}

delivery_adapter!(FeatureDelivery, FeatureSink, FeatureInsert, insert_feature_row);
delivery_adapter!(MisfitDelivery, MisfitSink, MisfitRecord, insert_misfit_row);
delivery_adapter!(PublishDelivery, Publisher, Publication, emit);
delivery_adapter!(AlertDelivery, AlertTransport, Alert, post);
