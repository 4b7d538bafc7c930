mod dispatch_test;
mod eula_test;
mod health_test;
mod modules_test;
mod submissions_test;
mod webhooks_test;
