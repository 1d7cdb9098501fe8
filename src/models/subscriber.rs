use crate::schema::{device_tokens, subscribers};
use diesel::Insertable;

#[derive(Insertable)]
#[diesel(table_name = subscribers)]
pub struct NewSubscriberRow<'a> {
    pub id: &'a str,
    pub locality: &'a str,
    pub region: &'a str,
}

#[derive(Insertable)]
#[diesel(table_name = device_tokens)]
pub struct NewDeviceTokenRow<'a> {
    pub token: &'a str,
    pub subscriber_id: &'a str,
    pub active: bool,
}
