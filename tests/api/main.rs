mod devices;
mod health_check;
mod helpers;
mod import;
mod notifications;
