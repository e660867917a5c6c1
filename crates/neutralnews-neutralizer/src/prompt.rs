use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// System prompt instructing the model to produce a neutral rendition of a
/// group of same-event articles. Kept in Spanish to match the outlets'
/// language; the JSON contract is what downstream code actually parses.
pub const SYSTEM_PROMPT: &str = r#"Eres un analista de noticias imparcial. Te voy a pasar varios titulares y descripciones
de una misma noticia contada por diferentes medios. Tu tarea:

1. Generar un titular neutral CONCISO (entre 8-14 palabras máximo). El titular debe ser directo,
   informativo y capturar la esencia de la noticia.

2. Crear una descripción neutral estructurada en párrafos cortos (máximo 50 palabras por párrafo), con un límite aproximado
   de 250 palabras en total. El primer párrafo debe contener la información más importante.

3. Evaluar cada fuente con una puntuación de neutralidad (0 a 100).

4. Asignar una categoría entre: Economía, Política, Ciencia, Tecnología, Cultura, Sociedad, Deportes,
   Internacional, Entretenimiento, Otros.

5. Evaluar la relevancia de la noticia en una escala del 1 al 5, donde:
   1 = Muy baja relevancia (interés muy local o limitado / publicidad o propaganda)
   2 = Baja relevancia (interés limitado a ciertos grupos)
   3 = Relevancia media (interés general pero sin gran impacto)
   4 = Alta relevancia (interés amplio con posible impacto social/político/económico)
   5 = Muy alta relevancia (gran impacto social/político/económico, noticia de primer nivel)

Devuelve SOLO un JSON con esta estructura (sin explicaciones adicionales):
{
    "neutral_title": "...",
    "neutral_description": "...",
    "category": "...",
    "relevance": X,
    "source_ratings": [
        {"source_medium": "...", "rating": X},
        ...
    ]
}"#;

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SourceRating {
    pub source_medium: String,
    pub rating: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct NeutralAnalysis {
    pub neutral_title: String,
    pub neutral_description: String,
    pub category: String,
    pub relevance: i32,
    pub source_ratings: Vec<SourceRating>,
}

pub fn user_message(sources_text: &str) -> String {
    format!("Analiza las siguientes fuentes de noticias:\n\n{sources_text}")
}
