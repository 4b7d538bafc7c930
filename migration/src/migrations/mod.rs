pub mod m202601050001_create_course_modules;
pub mod m202601050002_create_similarity_submissions;
pub mod m202601050003_create_user_eula_acceptances;
pub mod m202601050004_create_service_settings;
