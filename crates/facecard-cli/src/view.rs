//! Tabular database dump for `facecard view`.

use anyhow::Result;
use facecard_store::report::RECENT_TRANSACTIONS;
use facecard_store::Store;
use std::io::{self, Write};

/// Fixed-width text table.
pub struct Table {
    columns: Vec<(&'static str, usize)>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(columns: &[(&'static str, usize)]) -> Self {
        Self {
            columns: columns.to_vec(),
            rows: Vec::new(),
        }
    }

    pub fn row(&mut self, cells: Vec<String>) {
        self.rows.push(cells);
    }

    fn width(&self) -> usize {
        self.columns.iter().map(|(_, w)| w + 1).sum::<usize>().saturating_sub(1)
    }

    fn line(&self, cells: impl Iterator<Item = String>) -> String {
        let padded: Vec<String> = cells
            .zip(&self.columns)
            .map(|(cell, (_, width))| format!("{cell:<width$}"))
            .collect();
        padded.join(" ").trim_end().to_string()
    }

    pub fn render(&self, out: &mut impl Write) -> io::Result<()> {
        let rule = "-".repeat(self.width());
        writeln!(out, "{}", self.line(self.columns.iter().map(|(h, _)| h.to_string())))?;
        writeln!(out, "{rule}")?;
        for row in &self.rows {
            writeln!(out, "{}", self.line(row.iter().cloned()))?;
        }
        writeln!(out, "{rule}")
    }
}

fn or(value: &Option<String>, fallback: &str) -> String {
    value.clone().unwrap_or_else(|| fallback.to_string())
}

/// Write every section of the report to `out`.
pub fn render(store: &Store, out: &mut impl Write) -> Result<()> {
    let profiles = store.list_profiles()?;
    writeln!(out, "\n=== Users ===")?;
    let mut users = Table::new(&[
        ("ID", 5),
        ("Name", 20),
        ("Age", 5),
        ("Email", 25),
        ("Phone", 15),
        ("Registered", 20),
        ("Image Path", 30),
    ]);
    for p in &profiles {
        users.row(vec![
            p.id.to_string(),
            p.name.clone(),
            p.age.to_string(),
            or(&p.email, "N/A"),
            or(&p.phone, "N/A"),
            or(&p.registered_date, ""),
            or(&p.image_path, "N/A"),
        ]);
    }
    users.render(out)?;
    writeln!(out, "Total users: {}", profiles.len())?;

    writeln!(out, "\n=== Loyalty Cards ===")?;
    let groups = store.cards_by_user()?;
    let mut total_cards = 0;
    for group in &groups {
        let owner = group.user_name.as_deref().unwrap_or("(deleted user)");
        writeln!(out, "\nCards for {owner} (ID: {})", group.user_id)?;
        let mut cards = Table::new(&[
            ("Card ID", 8),
            ("Business", 15),
            ("Card Number", 20),
            ("Points", 8),
            ("Tier", 8),
            ("Registered", 20),
            ("Last Used", 20),
        ]);
        for card in &group.cards {
            cards.row(vec![
                card.id.to_string(),
                card.business_name.clone(),
                card.card_number.clone(),
                card.points.to_string(),
                card.tier_status.to_string(),
                or(&card.registration_date, ""),
                or(&card.last_used, "never"),
            ]);
        }
        cards.render(out)?;
        total_cards += group.cards.len();
    }
    writeln!(out, "Total loyalty cards: {total_cards}")?;

    writeln!(out, "\n=== Active Rewards ===")?;
    let mut rewards = store.list_rewards()?;
    rewards.sort_by(|a, b| {
        (&a.business_name, a.points_required).cmp(&(&b.business_name, b.points_required))
    });
    let mut table = Table::new(&[
        ("ID", 5),
        ("Type", 10),
        ("Business", 15),
        ("Name", 28),
        ("Points", 8),
        ("Tier", 8),
    ]);
    for r in &rewards {
        table.row(vec![
            r.id.to_string(),
            r.kind.to_string(),
            or(&r.business_name, "General"),
            r.name.clone(),
            r.points_required.to_string(),
            r.tier_required.map_or_else(|| "None".to_string(), |t| t.to_string()),
        ]);
    }
    table.render(out)?;
    writeln!(out, "Total rewards: {}", rewards.len())?;

    writeln!(out, "\n=== Claimed Rewards ===")?;
    let claims = store.claimed_rewards()?;
    let mut table = Table::new(&[
        ("User", 20),
        ("Reward", 28),
        ("Claimed", 20),
        ("Expires", 20),
        ("Status", 10),
    ]);
    for c in &claims {
        table.row(vec![
            c.user_name.clone(),
            c.reward_name.clone(),
            or(&c.claim_date, ""),
            or(&c.expiry_date, ""),
            c.status.clone(),
        ]);
    }
    table.render(out)?;
    writeln!(out, "Total claimed rewards: {}", claims.len())?;

    writeln!(out, "\n=== Points History ===")?;
    let (recent, total) = store.recent_transactions(RECENT_TRANSACTIONS)?;
    let mut table = Table::new(&[
        ("User", 20),
        ("Business", 15),
        ("Points", 8),
        ("Type", 8),
        ("Date", 20),
        ("Description", 30),
    ]);
    for t in &recent {
        table.row(vec![
            t.user_name.clone(),
            or(&t.business_name, "N/A"),
            format!("{:+}", t.points_change),
            t.kind.clone(),
            or(&t.transaction_date, ""),
            or(&t.description, ""),
        ]);
    }
    table.render(out)?;
    writeln!(out, "Total transactions: {total} (showing last {})", recent.len())?;

    writeln!(out, "\n=== Statistics ===")?;
    let stats = store.statistics()?;
    writeln!(
        out,
        "Users with loyalty cards: {} out of {}",
        stats.users_with_cards, stats.users
    )?;
    for b in &stats.businesses {
        writeln!(out, "- {}:", b.business_name)?;
        writeln!(out, "  Cards: {}", b.cards)?;
        writeln!(out, "  Total Points: {}", b.total_points)?;
        writeln!(out, "  Average Points: {:.0}", b.average_points)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use facecard_core::Descriptor;
    use facecard_store::{Catalog, NewIdentity};

    #[test]
    fn test_table_pads_columns() {
        let mut t = Table::new(&[("ID", 4), ("Name", 6)]);
        t.row(vec!["1".into(), "Ada".into()]);
        let mut out = Vec::new();
        t.render(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines, vec!["ID   Name", "-----------", "1    Ada", "-----------"]);
    }

    #[test]
    fn test_render_full_report() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(dir.path().join("facecard.db"));
        store.init_schema().unwrap();
        store.seed_rewards(&Catalog::builtin().unwrap()).unwrap();
        let id = store
            .insert_identity(&NewIdentity {
                name: "Ada".into(),
                age: 36,
                email: None,
                phone: None,
                image_path: None,
                descriptor: Descriptor::new(vec![0.0; 4]),
            })
            .unwrap();
        store.add_card(id, "GameZone", "GZ-1", 100).unwrap();
        store.earn_points(id, "GameZone", 20, Some("arcade")).unwrap();

        let mut out = Vec::new();
        render(&store, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Total users: 1"));
        assert!(text.contains("Cards for Ada (ID: 1)"));
        assert!(text.contains("Total rewards: 19"));
        assert!(text.contains("+20"));
        assert!(text.contains("Users with loyalty cards: 1 out of 1"));
        assert!(text.contains("  Total Points: 120"));
    }
}
