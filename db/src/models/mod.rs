pub mod course_module;
pub mod service_setting;
pub mod similarity_submission;
pub mod user_eula;

pub use course_module::Entity as CourseModule;
pub use service_setting::Entity as ServiceSetting;
pub use similarity_submission::Entity as SimilaritySubmission;
pub use user_eula::Entity as UserEula;
