use serde::{Deserialize, Serialize};

/// A press source identified by a stable tag. Adding or removing an outlet
/// is a registry edit only — nothing downstream switches on outlet identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outlet {
    Abc,
    Antena3,
    Cope,
    DiarioRed,
    ElDiario,
    ElEconomista,
    ElMundo,
    ElPais,
    ElPeriodico,
    ElSalto,
    EsDiario,
    Expansion,
    LaSexta,
    LaVanguardia,
    LibertadDigital,
    Rtve,
}

/// Display name and feed URL for an outlet.
pub struct OutletProfile {
    pub display_name: &'static str,
    pub feed_url: &'static str,
}

impl Outlet {
    /// Stable string tag used as the storage representation.
    pub fn tag(self) -> &'static str {
        match self {
            Outlet::Abc => "abc",
            Outlet::Antena3 => "antena3",
            Outlet::Cope => "cope",
            Outlet::DiarioRed => "diario_red",
            Outlet::ElDiario => "el_diario",
            Outlet::ElEconomista => "el_economista",
            Outlet::ElMundo => "el_mundo",
            Outlet::ElPais => "el_pais",
            Outlet::ElPeriodico => "el_periodico",
            Outlet::ElSalto => "el_salto",
            Outlet::EsDiario => "es_diario",
            Outlet::Expansion => "expansion",
            Outlet::LaSexta => "la_sexta",
            Outlet::LaVanguardia => "la_vanguardia",
            Outlet::LibertadDigital => "libertad_digital",
            Outlet::Rtve => "rtve",
        }
    }

    /// Parse the storage representation back into an `Outlet`.
    pub fn from_tag(tag: &str) -> Option<Outlet> {
        Self::all().iter().copied().find(|o| o.tag() == tag)
    }

    /// All registered outlets, in registry order.
    pub fn all() -> &'static [Outlet] {
        &[
            Outlet::Abc,
            Outlet::Antena3,
            Outlet::Cope,
            Outlet::DiarioRed,
            Outlet::ElDiario,
            Outlet::ElEconomista,
            Outlet::ElMundo,
            Outlet::ElPais,
            Outlet::ElPeriodico,
            Outlet::ElSalto,
            Outlet::EsDiario,
            Outlet::Expansion,
            Outlet::LaSexta,
            Outlet::LaVanguardia,
            Outlet::LibertadDigital,
            Outlet::Rtve,
        ]
    }

    /// Registry lookup: display name and feed URL.
    pub fn profile(self) -> OutletProfile {
        match self {
            Outlet::Abc => OutletProfile {
                display_name: "ABC",
                feed_url: "https://www.abc.es/rss/feeds/abcPortada.xml",
            },
            Outlet::Antena3 => OutletProfile {
                display_name: "Antena 3",
                feed_url: "https://www.antena3.com/rss/portada.xml",
            },
            Outlet::Cope => OutletProfile {
                display_name: "COPE",
                feed_url: "https://www.cope.es/api/es/rss/portada.xml",
            },
            Outlet::DiarioRed => OutletProfile {
                display_name: "Diario Red",
                feed_url: "https://diarioredcom.wordpress.com/feed/",
            },
            Outlet::ElDiario => OutletProfile {
                display_name: "elDiario.es",
                feed_url: "https://www.eldiario.es/rss/",
            },
            Outlet::ElEconomista => OutletProfile {
                display_name: "El Economista",
                feed_url: "https://www.eleconomista.es/rss/rss-portada.php",
            },
            Outlet::ElMundo => OutletProfile {
                display_name: "El Mundo",
                feed_url: "https://e00-elmundo.uecdn.es/elmundo/rss/portada.xml",
            },
            Outlet::ElPais => OutletProfile {
                display_name: "El País",
                feed_url: "https://feeds.elpais.com/mrss-s/pages/ep/site/elpais.com/portada",
            },
            Outlet::ElPeriodico => OutletProfile {
                display_name: "El Periódico",
                feed_url: "https://www.elperiodico.com/es/rss/rss_portada.xml",
            },
            Outlet::ElSalto => OutletProfile {
                display_name: "El Salto",
                feed_url: "https://www.elsaltodiario.com/rss",
            },
            Outlet::EsDiario => OutletProfile {
                display_name: "esDiario",
                feed_url: "https://www.esdiario.com/rss/portada.xml",
            },
            Outlet::Expansion => OutletProfile {
                display_name: "Expansión",
                feed_url: "https://e00-expansion.uecdn.es/rss/portada.xml",
            },
            Outlet::LaSexta => OutletProfile {
                display_name: "laSexta",
                feed_url: "https://www.lasexta.com/rss/portada.xml",
            },
            Outlet::LaVanguardia => OutletProfile {
                display_name: "La Vanguardia",
                feed_url: "https://www.lavanguardia.com/rss/home.xml",
            },
            Outlet::LibertadDigital => OutletProfile {
                display_name: "Libertad Digital",
                feed_url: "https://www.libertaddigital.com/rss/portada.xml",
            },
            Outlet::Rtve => OutletProfile {
                display_name: "RTVE",
                feed_url: "https://www.rtve.es/api/portada.rss",
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_outlet_has_a_profile() {
        for outlet in Outlet::all() {
            let profile = outlet.profile();
            assert!(!profile.display_name.is_empty());
            assert!(profile.feed_url.starts_with("https://"));
        }
    }

    #[test]
    fn tag_roundtrips_through_from_tag() {
        for outlet in Outlet::all() {
            assert_eq!(Outlet::from_tag(outlet.tag()), Some(*outlet));
        }
        assert_eq!(Outlet::from_tag("not-a-real-outlet"), None);
    }
}
