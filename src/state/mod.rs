pub mod application_store;

pub use application_store::{
    create_shared_application_store, ApplicationRecord, ApplicationStatus, ApplicationStore,
    SharedApplicationStore,
};
