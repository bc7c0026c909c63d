use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use super::*;
use crate::observability;

const FACILITIES_QUERY: &str = "\
query Facilities {
  facilities { id title rooms { id title isActive } }
}";

const EMPTY_SLOTS_QUERY: &str = "\
query EmptySlots($roomIds: [ID!]!, $date: DateTime!) {
  emptySlots(roomIds: $roomIds, date: $date) {
    roomId
    slots { id start end capacity freePlaces isAvailable }
  }
}";

const APPOINTMENTS_BY_SLOT_QUERY: &str = "\
query AppointmentsBySlot($slotId: ID!) {
  appointmentsBySlot(slotId: $slotId) { id slotId status }
}";

const CREATE_BOOKING_MUTATION: &str = "\
mutation CreateBooking($input: BookingInput!) {
  createBooking(input: $input) {
    booking { id status slotIds }
    errors { field message }
  }
}";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GraphqlRequest<'a, V> {
    operation_name: &'a str,
    query: &'a str,
    variables: V,
}

#[derive(Deserialize)]
struct GraphqlResponse<D> {
    data: Option<D>,
    #[serde(default)]
    errors: Vec<GraphqlErrorRecord>,
}

#[derive(Deserialize)]
struct GraphqlErrorRecord {
    message: String,
}

#[derive(Deserialize)]
struct FacilitiesData {
    facilities: Vec<FacilityRecord>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EmptySlotsData {
    empty_slots: Vec<RoomSlotsRecord>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppointmentsData {
    appointments_by_slot: Vec<AppointmentRecord>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateBookingData {
    create_booking: BookingPayload,
}

/// JSON-over-HTTP GraphQL client for the scheduling backend.
pub struct GraphqlClient {
    http: reqwest::Client,
    endpoint: String,
    token: Option<String>,
}

impl GraphqlClient {
    pub fn new(endpoint: impl Into<String>, token: Option<String>, timeout: Duration) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            endpoint: endpoint.into(),
            token,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn execute<V, D>(&self, operation: &'static str, query: &str, variables: V) -> Result<D, ApiError>
    where
        V: Serialize,
        D: DeserializeOwned,
    {
        let started = Instant::now();
        let result = self.send(operation, query, variables).await;
        metrics::histogram!(observability::API_REQUEST_DURATION_SECONDS, "operation" => operation)
            .record(started.elapsed().as_secs_f64());
        let status = if result.is_ok() { "ok" } else { "error" };
        metrics::counter!(observability::API_REQUESTS_TOTAL, "operation" => operation, "status" => status)
            .increment(1);
        result
    }

    async fn send<V, D>(&self, operation: &'static str, query: &str, variables: V) -> Result<D, ApiError>
    where
        V: Serialize,
        D: DeserializeOwned,
    {
        let body = GraphqlRequest {
            operation_name: operation,
            query,
            variables,
        };
        let mut request = self.http.post(&self.endpoint).json(&body);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        debug!("graphql {operation} -> {}", self.endpoint);
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status(status.as_u16()));
        }

        let envelope: GraphqlResponse<D> = response.json().await?;
        if !envelope.errors.is_empty() {
            return Err(ApiError::Graphql(
                envelope.errors.into_iter().map(|e| e.message).collect(),
            ));
        }
        envelope.data.ok_or(ApiError::MissingData(operation))
    }
}

#[async_trait]
impl SchedulingApi for GraphqlClient {
    async fn facilities(&self) -> Result<Vec<FacilityRecord>, ApiError> {
        let data: FacilitiesData = self.execute("Facilities", FACILITIES_QUERY, json!({})).await?;
        Ok(data.facilities)
    }

    async fn empty_slots(
        &self,
        room_ids: &[ResourceId],
        day_start: DateTime<FixedOffset>,
    ) -> Result<Vec<RoomSlotsRecord>, ApiError> {
        let variables = json!({
            "roomIds": room_ids,
            "date": day_start.to_rfc3339(),
        });
        let data: EmptySlotsData = self.execute("EmptySlots", EMPTY_SLOTS_QUERY, variables).await?;
        Ok(data.empty_slots)
    }

    async fn appointments_by_slot(&self, slot_id: &str) -> Result<Vec<AppointmentRecord>, ApiError> {
        let variables = json!({ "slotId": slot_id });
        let data: AppointmentsData = self
            .execute("AppointmentsBySlot", APPOINTMENTS_BY_SLOT_QUERY, variables)
            .await?;
        Ok(data.appointments_by_slot)
    }

    async fn create_booking(&self, input: &BookingInput) -> Result<BookingPayload, ApiError> {
        let variables = json!({ "input": input });
        let data: CreateBookingData = self
            .execute("CreateBooking", CREATE_BOOKING_MUTATION, variables)
            .await?;
        Ok(data.create_booking)
    }
}
