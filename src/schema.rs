/// Column-name constants for the four survey tables and the report tables.
/// Survey columns carry the question text verbatim, as exported by the form.

// ── Table names ─────────────────────────────────────────────────────────────
pub mod table {
    pub const REGISTRATION: &str = "inscription";
    pub const HOUSEHOLD: &str = "foyer";
    pub const INDIVIDUAL: &str = "individu";
    pub const ACCIDENT: &str = "accident";

    pub const ALL: [&str; 4] = [REGISTRATION, HOUSEHOLD, INDIVIDUAL, ACCIDENT];
}

// ── Columns shared by every table ───────────────────────────────────────────
pub mod common {
    pub const VOLUNTEER_ID: &str = "ID VOLONTAIRE";
    pub const BIRTH_YEAR: &str = "ANNEE DE NAISSANCE";
}

// ── Registration columns ────────────────────────────────────────────────────
pub mod registration {
    use super::common;

    pub const ENROLLMENT_DATE: &str = "DATE D'INSCRIPTION";

    pub const REQUIRED: [&str; 2] = [common::VOLUNTEER_ID, ENROLLMENT_DATE];
}

// ── Household columns ───────────────────────────────────────────────────────
pub mod household {
    use super::common;

    pub const HOUSING_TYPE: &str = "Dans quel type de logement vivez-vous ?";

    pub const REQUIRED: [&str; 2] = [common::VOLUNTEER_ID, HOUSING_TYPE];
}

// ── Individual columns ──────────────────────────────────────────────────────
pub mod individual {
    use super::common;

    pub const SEX: &str = "SEXE";
    pub const GENDER: &str = "À quel genre vous identifiez-vous ?";
    pub const EDUCATION: &str = "Quel est votre niveau d'études le plus élevé ?";
    pub const PHYSICAL_ACTIVITY: &str = "Pratiquez-vous une activité physique régulière ?";
    pub const WEIGHT_KG: &str = "Quel est votre poids (en kg) ?";
    pub const HEIGHT_CM: &str = "Quelle est votre taille (en cm) ?";
    pub const ALCOHOL: &str = "À quelle fréquence consommez-vous de l'alcool ?";
    pub const TOBACCO: &str = "À quelle fréquence consommez-vous du tabac ?";
    pub const CANNABIS: &str = "À quelle fréquence consommez-vous du cannabis ?";
    pub const PHYSICAL_RATING: &str =
        "Sur une échelle de 1 à 10, comment évaluez-vous votre santé physique ?";
    pub const MENTAL_RATING: &str =
        "Sur une échelle de 1 à 10, comment évaluez-vous votre santé mentale ?";
    pub const HAD_ACCIDENT: &str =
        "Avez-vous eu un accident de la vie courante au cours des 12 derniers mois ?";

    pub const REQUIRED: [&str; 14] = [
        common::VOLUNTEER_ID,
        common::BIRTH_YEAR,
        SEX,
        GENDER,
        EDUCATION,
        PHYSICAL_ACTIVITY,
        WEIGHT_KG,
        HEIGHT_CM,
        ALCOHOL,
        TOBACCO,
        CANNABIS,
        PHYSICAL_RATING,
        MENTAL_RATING,
        HAD_ACCIDENT,
    ];
}

// ── Accident columns ────────────────────────────────────────────────────────
pub mod accident {
    use super::common;

    pub const KIND: &str = "De quel type d'accident s'agissait-il ?";
    pub const LOCATION: &str = "Où a eu lieu l'accident ?";
    pub const DATE: &str = "À quelle date a eu lieu l'accident de la vie courante ?";
    pub const HOSPITALIZATION_DAYS: &str = "Combien de jours avez-vous été hospitalisé(e) ?";

    pub const REQUIRED: [&str; 5] = [
        common::VOLUNTEER_ID,
        KIND,
        LOCATION,
        DATE,
        HOSPITALIZATION_DAYS,
    ];
}

// ── Derived columns added by the pipeline ───────────────────────────────────
pub mod derived {
    pub const BMI: &str = "IMC";
    pub const AGE: &str = "Âge";
    pub const AGE_BAND: &str = "Tranche d'âge";
    pub const SEVERITY: &str = "Gravité";
    pub const ALCOHOL_LEVEL: &str = "Niveau alcool";
    pub const TOBACCO_LEVEL: &str = "Niveau tabac";
    pub const CANNABIS_LEVEL: &str = "Niveau cannabis";
}

// ── Report columns ──────────────────────────────────────────────────────────
pub mod report {
    pub const ACCIDENT_TYPE: &str = "Type d'accident";
    pub const ACCIDENT_LOCATION: &str = "Lieu de l'accident";
    pub const ACCIDENT_COUNT: &str = "Nombre d'accidents";
    pub const INDIVIDUAL_COUNT: &str = "Nombre d'individus";
    pub const REGISTRATION_COUNT: &str = "Nombre d'inscriptions";
    pub const DATE: &str = "Date";
    pub const HOUSING_TYPE: &str = "Type de logement";
    pub const LEVEL: &str = "Niveau";
    pub const AGE_BAND: &str = "Tranche d'âge";
    pub const SEVERITY: &str = "Gravité";
    pub const CATEGORY: &str = "Catégorie";
    pub const TABLE: &str = "Table";
    pub const PARTICIPATION_RATE: &str = "Taux de participation (%)";
    pub const PHYSICAL_RATING: &str = "Santé physique";
    pub const MENTAL_RATING: &str = "Santé mentale";
    pub const REGULAR_RESPONSE: &str = "Réponse régulière";
}
