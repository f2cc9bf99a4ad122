use serde::{Deserialize, Serialize};

/// Photo slots per gallery on the printed form.
const PHOTO_SLOTS: usize = 4;

fn empty_slots() -> Vec<String> {
    vec![String::new(); PHOTO_SLOTS]
}

/// Field report filled in by the RM after visiting the construction site.
///
/// Every scalar is free text as typed by the user; amounts are not parsed.
/// Photo lists hold upload URLs, one per slot, blank when unused.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SiteVisitForm {
    pub call_report_no: String,
    pub customer_name: String,
    pub customer_type: String,
    pub site_visit_date_time: String,
    pub person_met_at_site: String,
    pub bq_amount: String,
    pub construction_loan_amount: String,
    pub customer_contribution: String,
    pub drawn_funds_d1: String,
    pub drawn_funds_d2: String,
    pub drawn_funds_subtotal: String,
    pub undrawn_funds_to_date: String,
    pub brief_profile: String,
    pub site_exact_location: String,
    pub house_located_along: String,
    pub site_pin: String,
    pub security_details: String,
    pub plot_lr_no: String,
    pub site_visit_objective1: String,
    pub site_visit_objective2: String,
    pub site_visit_objective3: String,
    pub works_complete: String,
    pub works_ongoing: String,
    pub materials_found_on_site: String,
    pub defects_noted_on_site: String,
    pub drawdown_request_no: String,
    pub drawdown_kes_amount: String,
    pub documents_submitted: DocumentsSubmitted,
    pub prepared_by: String,
    pub signature: String,
    pub prepared_date: String,
    pub progress_photos_page3: Vec<String>,
    pub progress_photos_page4: Vec<String>,
    pub materials_on_site_photos: Vec<String>,
    pub defects_noted_photos: Vec<String>,
}

impl Default for SiteVisitForm {
    fn default() -> Self {
        Self {
            call_report_no: String::new(),
            customer_name: String::new(),
            customer_type: String::new(),
            site_visit_date_time: String::new(),
            person_met_at_site: String::new(),
            bq_amount: String::new(),
            construction_loan_amount: String::new(),
            customer_contribution: String::new(),
            drawn_funds_d1: String::new(),
            drawn_funds_d2: String::new(),
            drawn_funds_subtotal: String::new(),
            undrawn_funds_to_date: String::new(),
            brief_profile: String::new(),
            site_exact_location: String::new(),
            house_located_along: String::new(),
            site_pin: String::new(),
            security_details: String::new(),
            plot_lr_no: String::new(),
            site_visit_objective1: String::new(),
            site_visit_objective2: String::new(),
            site_visit_objective3: String::new(),
            works_complete: String::new(),
            works_ongoing: String::new(),
            materials_found_on_site: String::new(),
            defects_noted_on_site: String::new(),
            drawdown_request_no: String::new(),
            drawdown_kes_amount: String::new(),
            documents_submitted: DocumentsSubmitted::default(),
            prepared_by: String::new(),
            signature: String::new(),
            prepared_date: String::new(),
            progress_photos_page3: empty_slots(),
            progress_photos_page4: empty_slots(),
            materials_on_site_photos: empty_slots(),
            defects_noted_photos: empty_slots(),
        }
    }
}

/// Which supporting documents accompanied the drawdown request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DocumentsSubmitted {
    pub qs_valuation: String,
    pub interim_certificate: String,
    pub customer_instruction_letter: String,
    pub contractor_progress_report: String,
    pub contractor_invoice: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_fields_take_defaults() {
        let form: SiteVisitForm = serde_json::from_value(json!({
            "customerName": "Jane",
            "drawnFundsD1": "100000",
            "documentsSubmitted": {"qsValuation": "yes"}
        }))
        .unwrap();
        assert_eq!(form.customer_name, "Jane");
        assert_eq!(form.drawn_funds_d1, "100000");
        assert_eq!(form.documents_submitted.qs_valuation, "yes");
        assert_eq!(form.progress_photos_page3, vec!["", "", "", ""]);
        assert_eq!(form.defects_noted_photos.len(), 4);
    }

    #[test]
    fn wire_names_match_client_form() {
        let value = serde_json::to_value(SiteVisitForm::default()).unwrap();
        for key in [
            "callReportNo",
            "siteVisitObjective3",
            "plotLrNo",
            "drawdownKesAmount",
            "progressPhotosPage4",
            "materialsOnSitePhotos",
        ] {
            assert!(value.get(key).is_some(), "missing {key}");
        }
    }

    #[test]
    fn wrong_type_is_rejected() {
        let res = serde_json::from_value::<SiteVisitForm>(json!({"bqAmount": 5}));
        assert!(res.is_err());
        let res = serde_json::from_value::<SiteVisitForm>(json!({"progressPhotosPage3": "x"}));
        assert!(res.is_err());
    }
}
