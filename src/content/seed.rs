//! Default site copy.
//!
//! Every section key here always exists in the live tree. A stored row for a
//! section replaces the whole seed section.

use super::tree::ContentTree;
use serde_json::{Value, json};
use std::sync::LazyLock;

/// Sections rendered as specialty pages, with their URL slug.
pub const SPECIALTIES: &[(&str, &str)] = &[
    ("financialPlanners", "financial-planners"),
    ("medicare", "medicare"),
    ("stemCell", "stem-cell"),
    ("reverseMortgage", "reverse-mortgage"),
];

static SEED: LazyLock<ContentTree> = LazyLock::new(|| ContentTree::from_json(&seed_json()));

/// Shared seed tree. Clones are cheap.
pub fn seed_tree() -> ContentTree {
    SEED.clone()
}

fn seed_json() -> Value {
    json!({
        "home": {
            "hero": {
                "title": "Empower Your Client Acquisition",
                "subtitle": "Leverage AI and data intelligence to find and connect with your ideal clients efficiently",
                "ctaText": "Get Started Today"
            },
            "features": [
                {
                    "title": "Data-Driven Insights",
                    "description": "Utilize advanced analytics to identify high-value prospects"
                },
                {
                    "title": "Targeted Outreach",
                    "description": "Connect with the right clients at the right time"
                },
                {
                    "title": "Maximize ROI",
                    "description": "Optimize your meeting strategy for maximum profitability"
                }
            ]
        },
        "contact": {
            "title": "Contact Us",
            "subtitle": "We're here to help you succeed",
            "body": "Have questions? Our customer service team is ready to assist you.",
            "email": "support@meetingmarketerpro.com",
            "image": "https://d64gsuwffb70l.cloudfront.net/68fc69ac6e6835e7f96893e9_1761372645973_371dea05.webp"
        },
        "mission": {
            "title": "Our Mission",
            "subtitle": "Empowering Professionals in the AI Era",
            "body": "In today's world of AI and massive information availability, our goal is to empower our users to be the most efficient in finding and building their client base. We help you obtain, analyze and utilize the best tools so as to maximize profitability.",
            "image": "https://d64gsuwffb70l.cloudfront.net/68fc69ac6e6835e7f96893e9_1761376909568_d5b4d190.webp"
        },
        "financialPlanners": {
            "title": "Financial Planners",
            "subtitle": "Connect with High Net Worth Individuals",
            "body": "Utilizing the data to attract mid-high net worth individuals that are interested in your advice to keep on top of market and political changes. Our platform helps you identify prospects who are actively seeking financial guidance.",
            "image": "https://d64gsuwffb70l.cloudfront.net/68fc69ac6e6835e7f96893e9_1761373673776_fce89b8d.webp"
        },
        "medicare": {
            "title": "Medicare Specialists",
            "subtitle": "Find Clients at the Right Time",
            "body": "Finding those at the right time to get them properly signed up for Medicare (turning 65 meetings) and to help others that may want to change their plan during open enrollment. Target prospects when they need you most.",
            "image": "https://d64gsuwffb70l.cloudfront.net/68fc69ac6e6835e7f96893e9_1761373675634_b2de2458.webp"
        },
        "stemCell": {
            "title": "Stem Cell Practitioners",
            "subtitle": "Educate High-Value Prospects",
            "body": "Targeting certain age and income/net worth individuals to educate them on the benefits of a pain free life. Connect with prospects who are seeking innovative health solutions.",
            "image": "https://d64gsuwffb70l.cloudfront.net/68fc69ac6e6835e7f96893e9_1761373677625_6f8d7d9b.webp"
        },
        "reverseMortgage": {
            "title": "Reverse Mortgage Lenders",
            "subtitle": "Help Seniors Live Stress-Free",
            "body": "Helping those 62+ who want to live stress free in their later years and have equity in their home they have earned and want to enjoy without worrying about payments. Find qualified homeowners ready to explore their options.",
            "image": "https://d64gsuwffb70l.cloudfront.net/68fc69ac6e6835e7f96893e9_1761373679424_fb50575a.webp"
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::path::ContentPath;

    #[test]
    fn test_seed_has_every_section() {
        let tree = seed_tree();
        let names: Vec<_> = tree.section_names().collect();
        for name in ["home", "contact", "mission"] {
            assert!(names.contains(&name), "missing {name}");
        }
        for (name, _) in SPECIALTIES {
            assert!(names.contains(name), "missing {name}");
        }
    }

    #[test]
    fn test_seed_is_shared() {
        assert!(seed_tree().ptr_eq(&seed_tree()));
    }

    #[test]
    fn test_seed_home_shape() {
        let tree = seed_tree();
        let title = ContentPath::parse("home.features.2.title").unwrap();
        assert_eq!(tree.text(&title), "Maximize ROI");
        let cta = ContentPath::parse("home.hero.ctaText").unwrap();
        assert_eq!(tree.text(&cta), "Get Started Today");
    }
}
