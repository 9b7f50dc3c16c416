//! Landing page after login: headline numbers and charts.
//!
//! Admins see cooperative-wide figures from both stats endpoints. Farmers see
//! their own crop breakdown; the server scopes `/crops/stats` to the caller.

use crate::context::Services;
use crate::error::Result;
use crate::pages::{Notice, PageCore, Phase};
use crate::resources::{CropsClient, FarmersClient};
use crate::session::Session;
use crate::types::{CropStats, FarmerStats};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatCard {
    pub title: &'static str,
    pub value: String,
    pub description: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartKind {
    Bar,
    Pie,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChartPoint {
    pub label: String,
    pub value: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Chart {
    pub title: &'static str,
    pub kind: ChartKind,
    pub points: Vec<ChartPoint>,
}

/// Everything the dashboard renders.
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardView {
    pub greeting: String,
    pub cards: Vec<StatCard>,
    pub charts: Vec<Chart>,
}

#[derive(Debug)]
pub struct DashboardPage {
    core: PageCore,
    farmers: FarmersClient,
    crops: CropsClient,
    view: Option<DashboardView>,
}

impl DashboardPage {
    pub fn new(services: &Services) -> Self {
        Self {
            core: PageCore::new(services.session.clone()),
            farmers: services.farmers.clone(),
            crops: services.crops.clone(),
            view: None,
        }
    }

    pub fn open(&mut self) -> &Phase {
        if let Some(session) = self.core.enter(None) {
            let _ = self.load(&session);
        }
        self.core.phase()
    }

    pub fn reload(&mut self) -> Result<()> {
        let session = self.core.session().require()?;
        self.load(&session)
    }

    fn load(&mut self, session: &Session) -> Result<()> {
        let ticket = self.core.ticket();
        let result = self.crops.get_stats().and_then(|crop_stats| {
            let farmer_stats = if session.is_admin() {
                Some(self.farmers.get_stats()?)
            } else {
                None
            };
            Ok((crop_stats, farmer_stats))
        });
        if let Some((crop_stats, farmer_stats)) =
            self.core.settle(&ticket, result, "Failed to load dashboard data")?
        {
            self.view = Some(match farmer_stats {
                Some(farmer_stats) => admin_view(&farmer_stats, &crop_stats),
                None => farmer_view(session.display_name.as_deref(), &crop_stats),
            });
            self.core.mark_ready();
        }
        Ok(())
    }

    pub fn phase(&self) -> &Phase {
        self.core.phase()
    }

    pub fn view(&self) -> Option<&DashboardView> {
        self.view.as_ref()
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.core.notice()
    }
}

/// Average crops per farmer rounded to one decimal; zero without farmers.
pub fn average_crops(total_crops: u32, total_farmers: u32) -> f64 {
    if total_farmers == 0 {
        return 0.0;
    }
    (f64::from(total_crops) / f64::from(total_farmers) * 10.0).round() / 10.0
}

fn distribution(crop_stats: &CropStats) -> Vec<ChartPoint> {
    crop_stats
        .crops_by_type
        .iter()
        .map(|c| ChartPoint {
            label: c.crop_type.label().to_string(),
            value: c.count,
        })
        .collect()
}

fn varieties(crop_stats: &CropStats) -> usize {
    crop_stats.crops_by_type.iter().filter(|c| c.count > 0).count()
}

pub fn admin_view(farmer_stats: &FarmerStats, crop_stats: &CropStats) -> DashboardView {
    let average = average_crops(farmer_stats.total_crops, farmer_stats.total_farmers);
    DashboardView {
        greeting: "Overview of your cooperative management system".to_string(),
        cards: vec![
            StatCard {
                title: "Total Farmers",
                value: farmer_stats.total_farmers.to_string(),
                description: "Active farmer accounts",
            },
            StatCard {
                title: "Total Crops",
                value: farmer_stats.total_crops.to_string(),
                description: "Crops across all farmers",
            },
            StatCard {
                title: "Avg Crops/Farmer",
                value: average.to_string(),
                description: "Average per farmer",
            },
            StatCard {
                title: "Crop Varieties",
                value: varieties(crop_stats).to_string(),
                description: "Different crop types",
            },
        ],
        charts: vec![
            Chart {
                title: "Crops per Farmer",
                kind: ChartKind::Bar,
                points: farmer_stats
                    .crops_per_farmer
                    .iter()
                    .map(|f| ChartPoint {
                        label: format!("{} {}", f.first_name, f.last_name),
                        value: f.crop_total(),
                    })
                    .collect(),
            },
            Chart {
                title: "System Crop Distribution",
                kind: ChartKind::Pie,
                points: distribution(crop_stats),
            },
        ],
    }
}

pub fn farmer_view(first_name: Option<&str>, crop_stats: &CropStats) -> DashboardView {
    DashboardView {
        greeting: format!(
            "Welcome back, {}! Manage your crops and profile.",
            first_name.unwrap_or("Farmer")
        ),
        cards: vec![
            StatCard {
                title: "My Crops",
                value: crop_stats.total_crops.to_string(),
                description: "Your registered crops",
            },
            StatCard {
                title: "Crop Types",
                value: varieties(crop_stats).to_string(),
                description: "Different varieties you grow",
            },
        ],
        charts: vec![Chart {
            title: "Your Crop Distribution",
            kind: ChartKind::Pie,
            points: distribution(crop_stats),
        }],
    }
}
