pub mod firestore_client;
pub mod gcs_client;
pub mod google_auth;
pub mod hugging_face_client;

pub use firestore_client::{FirestoreClient, FirestoreDocument};
pub use gcs_client::GcsClient;
pub use google_auth::GoogleAuth;
pub use hugging_face_client::{HuggingFaceClient, ImageLabel};
