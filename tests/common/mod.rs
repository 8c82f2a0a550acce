use chrono::NaiveDate;
use seriea_stats::model::{
    Calendar, Coach, History, Match, PlayerDetailed, PlayerTechnical, Stadium, Team,
};
use seriea_stats::Catalog;

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn team(name: &str, points: i64, goals_for: i64, goals_against: i64) -> Team {
    Team {
        team_name: name.into(),
        points,
        goals_for,
        goals_against,
        goal_difference: goals_for - goals_against,
        ..Default::default()
    }
}

/// A small season: 4 teams, 5 players, 3 coaches, a few fixtures and titles
pub fn league() -> Catalog {
    let mut catalog = Catalog::new();

    for t in [
        team("Napoli", 90, 77, 28),
        team("Lazio", 74, 60, 30),
        team("Inter", 72, 71, 42),
        team("Cremonese", 27, 36, 69),
    ] {
        catalog.teams.create(t);
    }

    for (name, team, goals, assists, age) in [
        ("Osimhen", 1, 26, 4, Some(24)),
        ("Kvaratskhelia", 1, 12, 13, Some(22)),
        ("Immobile", 2, 12, 3, Some(33)),
        ("Lautaro", 3, 21, 6, Some(25)),
        ("Okereke", 4, 3, 2, None),
    ] {
        let id = catalog
            .player_technical
            .create(PlayerTechnical {
                player_name: name.into(),
                player_team: Some(team),
                goal_scored: goals,
                assist_scored: assists,
                ..Default::default()
            })
            .player_id;
        catalog.player_detailed.create(PlayerDetailed { player_id: id, player_age: age, player_country: None });
    }

    for (name, country, experience) in [("Spalletti", "IT", 20), ("Inzaghi", "IT", 10), ("Ballardini", "ES", 5)] {
        catalog.coaches.create(Coach {
            coach_name: name.into(),
            coach_country: Some(country.into()),
            experience,
            ..Default::default()
        });
    }

    catalog.stadiums.create(Stadium {
        stadium_name: "Maradona".into(),
        city: "Naples".into(),
        capacity: 54_726,
        stadium_team: Some(1),
        ..Default::default()
    });

    for (home, away, hg, ag, day) in [(1, 2, 1, 1, date(2023, 1, 5)), (3, 4, 2, 1, date(2023, 1, 20))] {
        catalog.matches.create(Match {
            match_id: 0,
            home_team: home,
            away_team: away,
            home_goals: hg,
            away_goals: ag,
            match_date: day,
        });
    }

    for (name, day) in [
        ("Napoli - Lazio", date(2023, 1, 5)),
        ("Inter - Cremonese", date(2023, 1, 20)),
        ("Lazio - Inter", date(2023, 2, 11)),
    ] {
        catalog.calendar.create(Calendar { event_id: 0, event_name: name.into(), event_date: day });
    }

    for (year, win_team) in [(2021, Some(3)), (2022, None), (2023, Some(1)), (2024, Some(3))] {
        catalog.history.create(History { year, win_team, ..Default::default() });
    }

    catalog
}
