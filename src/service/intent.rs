//! Keyword intent detection for maintenance queries in English, French,
//! Arabic and Darija, and the retrieval plan each intent implies.

use crate::text::normalize;
use crate::types::domain::Intent;
use serde::Serialize;
use std::sync::LazyLock;

/// Keywords per intent. Table order breaks ties.
/// Phrases (two words or more) weigh 2, single words 1. Words match whole
/// tokens (a trailing `s` allowed); a trailing `*` marks a stem matched as
/// a token prefix.
const KEYWORDS: &[(Intent, &[&str])] = &[
    (
        Intent::Safety,
        &[
            // en
            "safety", "danger", "hazard", "lockout", "tagout", "loto", "ppe", "protective",
            "warning", "risk", "electrocution", "fire", "burn",
            // fr
            "securite", "consignation", "epi", "protection", "avertissement", "risque",
            "incendie", "brulure",
            // ar
            "سلامة", "خطر", "أمان", "وقاية", "تحذير", "حريق", "صعق", "حروق",
            // darija
            "khatar", "خطير", "لامان",
        ],
    ),
    (
        Intent::Troubleshooting,
        &[
            // en
            "not working", "doesn't work", "broken", "failure", "fault", "error", "alarm",
            "breakdown", "leak", "noise", "overheat*", "vibration", "won't start", "stopped",
            "troubleshoot*", "problem", "issue", "repair*",
            // fr
            "panne", "ne marche pas", "ne fonctionne pas", "defaut", "defaillance", "erreur",
            "alarme", "fuite", "bruit", "surchauffe", "ne demarre pas", "arret", "probleme",
            "depannage", "repar*", "casse",
            // ar
            "عطل", "عطب", "لا يعمل", "مشكلة", "خطأ", "إنذار", "تسرب", "ضجيج", "ارتفاع الحرارة",
            "اهتزاز", "توقف", "إصلاح",
            // darija
            "khasra", "mkhasra", "makhdamach", "ma khdamach", "t3tal", "mochkil", "ماخدامش",
            "خاسرة", "مخسرة", "طايحة", "مشكل", "تعطل",
        ],
    ),
    (
        Intent::MaintenanceProcedure,
        &[
            // en
            "maintenance", "service", "lubricat*", "grease", "clean*", "inspect*", "replac*",
            "change the", "procedure", "how often", "interval", "preventive", "calibrat*",
            "tighten",
            // fr
            "entretien", "graissage", "graisser", "lubrifi*", "nettoy*", "remplac*", "changer",
            "vidange", "frequence", "intervalle", "preventi*", "controle", "etalonn*", "serrage",
            // ar
            "صيانة", "تشحيم", "تنظيف", "فحص", "استبدال", "تغيير", "إجراء", "كل كم", "دورية",
            "وقائية", "معايرة",
            // darija
            "nbdel", "tbdel", "nbeddel", "nchahem", "nnaddaf", "نبدل", "نشحم", "ننظف",
        ],
    ),
    (
        Intent::SpareParts,
        &[
            // en
            "spare part", "part number", "spare", "replacement part", "reference", "order part",
            "stock", "filter kit", "seal", "bearing", "gasket", "belt",
            // fr
            "piece de rechange", "pieces de rechange", "piece detachee", "numero de piece",
            "commander", "joint", "roulement", "courroie",
            // ar
            "قطعة غيار", "قطع الغيار", "رقم القطعة", "مرجع", "مخزون", "حشوة", "محمل",
            // darija
            "pyasa", "lpiece", "بياسة", "البياسة", "روليما", "كورويا",
        ],
    ),
    (
        Intent::Specifications,
        &[
            // en
            "specification", "capacity", "pressure", "voltage", "power", "rating", "dimension",
            "weight", "flow rate", "temperature range", "torque", "model number", "datasheet",
            // fr
            "caracteristique", "capacite", "pression", "tension", "puissance", "poids", "debit",
            "couple", "fiche technique", "plage de temperature",
            // ar
            "مواصفات", "سعة", "ضغط", "جهد", "قدرة", "أبعاد", "وزن", "تدفق", "عزم",
            // darija
            "chhal", "ch7al", "kaddach", "شحال", "قداش",
        ],
    ),
    (
        Intent::WorkOrder,
        &[
            // en
            "work order", "ticket", "intervention", "assigned", "technician", "schedule",
            "history", "last repair", "when was", "status of",
            // fr
            "ordre de travail", "bon de travail", "technicien", "planifi*", "historique",
            "derniere intervention", "statut",
            // ar
            "أمر عمل", "أوامر العمل", "تدخل", "فني", "جدولة", "سجل", "آخر إصلاح",
            // darija
            "tadakhol", "imta", "fo9ach", "شكون", "فوقاش", "امتى",
        ],
    ),
];

enum Needle {
    /// Whole token, optionally followed by a plural `s`.
    Word(String),
    /// Token prefix.
    Stem(String),
    /// Consecutive tokens, stored padded with spaces.
    Phrase(String),
}

struct Keyword {
    needle: Needle,
    weight: u32,
}

impl Keyword {
    fn parse(raw: &str) -> Self {
        let stem = raw.ends_with('*');
        let normalized = normalize(raw.trim_end_matches('*'));
        if normalized.contains(' ') {
            Keyword {
                needle: Needle::Phrase(format!(" {normalized} ")),
                weight: 2,
            }
        } else if stem {
            Keyword {
                needle: Needle::Stem(normalized),
                weight: 1,
            }
        } else {
            Keyword {
                needle: Needle::Word(normalized),
                weight: 1,
            }
        }
    }

    fn matches(&self, padded: &str, tokens: &[&str]) -> bool {
        match &self.needle {
            Needle::Phrase(p) => padded.contains(p.as_str()),
            Needle::Word(w) => tokens
                .iter()
                .any(|t| *t == w.as_str() || t.strip_suffix('s') == Some(w.as_str())),
            Needle::Stem(p) => tokens.iter().any(|t| t.starts_with(p.as_str())),
        }
    }
}

/// Arabic attached prefixes (`ال`, `وال`, `بال`, `لل`...) that would hide
/// the keyword inside a token.
const ARABIC_PREFIXES: &[&str] = &["وال", "بال", "فال", "كال", "لل", "ال"];

fn without_article(token: &str) -> Option<&str> {
    ARABIC_PREFIXES
        .iter()
        .find_map(|p| token.strip_prefix(p))
        .filter(|rest| rest.chars().count() >= 2)
}

static TABLE: LazyLock<Vec<(Intent, Vec<Keyword>)>> = LazyLock::new(|| {
    KEYWORDS
        .iter()
        .map(|(intent, words)| (*intent, words.iter().map(|w| Keyword::parse(w)).collect()))
        .collect()
});

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct IntentMatch {
    pub intent: Intent,
    pub score: u32,
    pub confidence: f32,
}

/// Score every intent by the keywords `text` contains and pick the best.
pub fn detect_intent(text: &str) -> IntentMatch {
    let normalized = normalize(text);
    let padded = format!(" {normalized} ");
    let mut tokens: Vec<&str> = normalized.split(' ').filter(|t| !t.is_empty()).collect();
    let bare: Vec<&str> = tokens.iter().filter_map(|t| without_article(t)).collect();
    tokens.extend(bare);

    let mut scores: Vec<(Intent, u32)> = TABLE
        .iter()
        .map(|(intent, keywords)| {
            let score = keywords
                .iter()
                .filter(|k| k.matches(&padded, &tokens))
                .map(|k| k.weight)
                .sum();
            (*intent, score)
        })
        .collect();
    // stable sort keeps table order among equal scores
    scores.sort_by(|a, b| b.1.cmp(&a.1));

    let (best_intent, best) = scores[0];
    let second = scores.get(1).map(|s| s.1).unwrap_or(0);
    if best == 0 {
        return IntentMatch {
            intent: Intent::General,
            score: 0,
            confidence: 0.0,
        };
    }
    IntentMatch {
        intent: best_intent,
        score: best,
        confidence: best as f32 / (best + second + 1) as f32,
    }
}

/// Which records feed an answer for a given intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrievalPlan {
    pub chunk_limit: usize,
    pub asset_details: bool,
    pub components: bool,
    pub spare_parts: bool,
    pub maintenance_plans: bool,
    pub work_orders: bool,
}

pub fn retrieval_plan(intent: Intent, top_k: usize) -> RetrievalPlan {
    let base = RetrievalPlan {
        chunk_limit: top_k,
        asset_details: true,
        components: false,
        spare_parts: false,
        maintenance_plans: false,
        work_orders: false,
    };
    match intent {
        Intent::Troubleshooting => RetrievalPlan {
            chunk_limit: top_k + top_k / 2,
            components: true,
            work_orders: true,
            ..base
        },
        Intent::MaintenanceProcedure => RetrievalPlan {
            maintenance_plans: true,
            spare_parts: true,
            ..base
        },
        Intent::SpareParts => RetrievalPlan {
            chunk_limit: top_k / 2,
            components: true,
            spare_parts: true,
            ..base
        },
        Intent::Specifications => RetrievalPlan {
            components: true,
            ..base
        },
        Intent::Safety => RetrievalPlan {
            chunk_limit: top_k + top_k / 2,
            ..base
        },
        Intent::WorkOrder => RetrievalPlan {
            chunk_limit: top_k / 2,
            work_orders: true,
            maintenance_plans: true,
            ..base
        },
        Intent::General => base,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_intents_across_languages() {
        let cases = [
            ("The compressor is not working and shows an alarm", Intent::Troubleshooting),
            ("Le compresseur est en panne, fuite d'huile", Intent::Troubleshooting),
            ("الضاغط فيه عطل", Intent::Troubleshooting),
            ("l machine makhdamach", Intent::Troubleshooting),
            ("Comment faire la vidange du réducteur ?", Intent::MaintenanceProcedure),
            ("What is the part number of the bearing?", Intent::SpareParts),
            ("واش كاينة البياسة؟", Intent::SpareParts),
            ("Quelle est la pression maximale ?", Intent::Specifications),
            ("What PPE is needed before lockout?", Intent::Safety),
            ("Open a work order for the chiller", Intent::WorkOrder),
        ];
        for (query, expected) in cases {
            assert_eq!(detect_intent(query).intent, expected, "{query}");
        }
    }

    #[test]
    fn short_keywords_do_not_fire_inside_longer_words() {
        for query in ["The pump stopped", "The burner stopped"] {
            let m = detect_intent(query);
            assert_eq!(m.intent, Intent::Troubleshooting, "{query}");
            assert_eq!(m.score, 1, "{query}");
        }
        assert_eq!(detect_intent("Check the developer notes").intent, Intent::General);
    }

    #[test]
    fn stems_plurals_and_arabic_articles() {
        assert_eq!(detect_intent("Lubrification du palier").intent, Intent::MaintenanceProcedure);
        assert_eq!(detect_intent("Worn belts").intent, Intent::SpareParts);
        assert_eq!(detect_intent("ما هي مواصفات المضخة").intent, Intent::Specifications);
        assert_eq!(detect_intent("برنامج الصيانة").intent, Intent::MaintenanceProcedure);
    }

    #[test]
    fn no_keyword_means_general() {
        let m = detect_intent("Bonjour");
        assert_eq!(m.intent, Intent::General);
        assert_eq!(m.confidence, 0.0);
    }

    #[test]
    fn ties_follow_table_order() {
        // one safety keyword, one troubleshooting keyword
        let m = detect_intent("danger fuite");
        assert_eq!(m.intent, Intent::Safety);
        assert_eq!(m.score, 1);
        assert!((m.confidence - 1.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn phrases_outweigh_single_words() {
        let m = detect_intent("Spare part for the pump");
        assert_eq!(m.intent, Intent::SpareParts);
        assert_eq!(m.score, 3, "'spare part' (2) + 'spare' (1)");
    }

    #[test]
    fn plans_route_structured_records() {
        let plan = retrieval_plan(Intent::SpareParts, 4);
        assert!(plan.spare_parts && plan.components && !plan.work_orders);
        assert_eq!(plan.chunk_limit, 2);
        assert_eq!(retrieval_plan(Intent::Troubleshooting, 4).chunk_limit, 6);
        assert_eq!(retrieval_plan(Intent::General, 4), RetrievalPlan {
            chunk_limit: 4,
            asset_details: true,
            components: false,
            spare_parts: false,
            maintenance_plans: false,
            work_orders: false,
        });
    }
}
