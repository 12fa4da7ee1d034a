use matchday_lib::traffic::TrafficRequest;

/// A match every advice request is pinned to, whatever the client sent.
#[derive(Debug, Clone, PartialEq)]
pub struct PinnedFixture {
    pub destination_latitude: f64,
    pub destination_longitude: f64,
    pub game_time: String,
    pub favorite_club: String,
    /// Clubs whose supporters' reports seed the prompt.
    pub clubs: Vec<String>,
}

impl PinnedFixture {
    /// Overwrites destination, kick-off and club. The current position is kept.
    pub fn apply(&self, request: &mut TrafficRequest) {
        request.destination_latitude = self.destination_latitude;
        request.destination_longitude = self.destination_longitude;
        request.game_time = self.game_time.clone();
        request.favorite_club = self.favorite_club.clone();
    }
}

/// Club labels to fetch historical reports for.
pub fn clubs_for(request: &TrafficRequest, fixture: Option<&PinnedFixture>) -> Vec<String> {
    match fixture {
        Some(fixture) => fixture.clubs.clone(),
        None => vec![request.favorite_club.clone()],
    }
}
