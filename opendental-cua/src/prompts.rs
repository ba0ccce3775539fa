//! Schema prompts handed to the inference service alongside the captured
//! screenshots, plus the shared agent guidelines.

pub const AGENT_GUIDELINES: &str = "IMPORTANT GUIDELINES:
- Always wait for windows and dialogs to fully load before interacting
- Look for loading indicators and wait for them to disappear
- Verify each action by checking on-screen confirmation
- If a button or element is not visible, try scrolling or looking for it
- Take screenshots to verify your progress";

pub const PATIENTS_SCHEMA: &str = r#"Analyze these screenshots of Open Dental "Select Patient" dialog.
The screenshots show the same table scrolled to different positions to reveal all columns.

Extract all visible patient information from ALL screenshots into this JSON format:

{
  "patients": [
    {
      "patient_id": <int or null>,
      "first_name": "<string>",
      "last_name": "<string>",
      "age": <int or null>,
      "wireless_phone": "<string or null>",
      "home_phone": "<string or null>",
      "work_phone": "<string or null>",
      "address": "<string or null>",
      "city": "<string or null>",
      "status": "<string or null>"
    }
  ],
  "total_count": <int>
}

COLUMN MAPPING:
- PatNum -> patient_id
- First Name -> first_name
- Last Name -> last_name
- Age -> age
- Wireless Ph -> wireless_phone
- Hm Phone -> home_phone
- Wk Phone -> work_phone
- Address -> address
- City -> city
- Status -> status

IMPORTANT:
- The first screenshot shows the left columns, the second the right columns
- Match patients across screenshots by their row position in the table
- If a field is not visible or readable, use null
- Extract phone numbers exactly as shown

Return ONLY the JSON object, no additional text."#;

pub const APPOINTMENTS_SCHEMA: &str = r#"Analyze this screenshot of Open Dental appointment schedule.
Extract all visible appointment information into this JSON format:

{
  "appointments": [
    {
      "time": "<string - e.g., '9:00 AM'>",
      "patient_name": "<string>",
      "procedure": "<string or null>",
      "provider": "<string or null>",
      "operatory": "<string or null>",
      "status": "<string or null>",
      "duration_minutes": <int or null>,
      "notes": "<string or null>"
    }
  ],
  "date": "<string - the date shown>",
  "total_appointments": <int>
}

IMPORTANT:
- Only include appointments that are clearly visible
- Time should be in readable format
- Procedure codes or descriptions if visible
- Provider/doctor name if shown

Return ONLY the JSON object, no additional text."#;

pub const PATIENT_REPORT_SCHEMA: &str = r#"Analyze these screenshots from Open Dental showing different tabs for a single patient.
The screenshots are in order: Family Tab, Account Tab, Tx Plan Tab, Appointments Tab.

Extract ALL visible information into this JSON format:

{
  "patient_report": {
    "generated_at": "<current timestamp>",
    "patient_info": {
      "patient_id": <int or null>,
      "last_name": "<string>",
      "first_name": "<string>",
      "gender": "<string or null>",
      "birthdate": "<string MM/DD/YYYY or null>",
      "age": <int or null>,
      "address": {"street": "<string or null>", "city": "<string or null>", "state": "<string or null>", "zip": "<string or null>"},
      "contact": {"home_phone": "<string or null>", "wireless_phone": "<string or null>", "email": "<string or null>"},
      "billing_type": "<string or null>",
      "primary_provider": "<string or null>"
    },
    "family_members": [
      {"name": "<string>", "position": "<string or null>", "status": "<string or null>", "age": "<string or null>", "recall_due": "<string or null>"}
    ],
    "insurance": {
      "primary": {"subscriber_name": "<string or null>", "carrier": "<string or null>", "group_number": "<string or null>", "plan_type": "<string or null>"},
      "secondary": {"subscriber_name": "<string or null>", "carrier": "<string or null>", "group_number": "<string or null>"}
    },
    "recall": {"type": "<string or null>", "interval": "<string or null>", "due_date": "<string or null>"},
    "account": {
      "transactions": [
        {"date": "<string>", "code": "<string or null>", "tooth": "<string or null>", "description": "<string>", "charges": <float or null>, "credits": <float or null>, "balance": <float or null>}
      ],
      "claims": [
        {"date": "<string>", "carrier": "<string>", "amount": <float or null>, "status": "<string or null>"}
      ],
      "balances": {"patient_balance": <float or null>, "total_family_balance": <float or null>}
    },
    "treatment_plans": {
      "procedures": [
        {"priority": "<int or null>", "tooth": "<string or null>", "surface": "<string or null>", "code": "<string>", "description": "<string>", "fee": <float>, "insurance_estimate": <float or null>, "patient_portion": <float or null>}
      ],
      "totals": {"total_fee": <float or null>, "total_insurance_estimate": <float or null>, "total_patient_portion": <float or null>}
    },
    "appointments": {
      "past_appointments": [
        {"date": "<string>", "time": "<string or null>", "provider": "<string or null>", "status": "<string or null>", "procedures": "<string or null>"}
      ],
      "scheduled_appointments": [
        {"date": "<string>", "time": "<string or null>", "provider": "<string or null>", "status": "<string or null>", "procedures": "<string or null>"}
      ]
    },
    "summary": {
      "total_outstanding_balance": <float or null>,
      "pending_insurance_claims": <int or null>,
      "pending_treatment_value": <float or null>,
      "next_recall_due": "<string or null>"
    }
  }
}

GENERAL RULES:
- Use null for any field that is not visible or readable
- Extract currency values as numbers without $ symbol
- Extract dates exactly as shown
- If a tab appears empty, still include the section with available info

Return ONLY the JSON object, no additional text."#;

pub const PATIENT_CHART_SCHEMA: &str = r#"Analyze this screenshot from Open Dental showing the Chart tab for a single patient.

Extract ALL visible information into this JSON format:

{
  "patient_chart": {
    "generated_at": "<current timestamp>",
    "patient_info": {
      "name": "<string - patient name from title bar>",
      "age": <int or null>,
      "allergies": "<string or 'none'>",
      "medications": "<string or 'none'>",
      "problems": "<string or 'none'>",
      "billing_type": "<string or null>",
      "date_first_visit": "<string or null>"
    },
    "tooth_chart": {
      "description": "<string - what the tooth chart shows>",
      "teeth_with_conditions": [
        {"tooth_number": <int 1-32>, "condition": "<string>", "surface": "<string or null>", "notes": "<string or null>"}
      ]
    },
    "procedures": [
      {"date": "<string MM/DD/YYYY>", "tooth": "<string or null>", "surface": "<string or null>", "description": "<string>", "status": "<string or null>", "provider": "<string or null>", "amount": <float or null>, "ada_code": "<string or null>"}
    ],
    "clinical_explanation": {
      "overall_dental_health": "<string>",
      "treatment_history": "<string>",
      "treatment_needs": "<string>",
      "recommendations": "<string>"
    },
    "summary": {
      "patient_name": "<string>",
      "total_teeth_with_work": <int>,
      "missing_teeth_count": <int>,
      "last_visit_date": "<string or null>"
    }
  }
}

GUIDELINES:
- Teeth are numbered 1-32 (upper right 1-8, upper left 9-16, lower left 17-24, lower right 25-32)
- Status codes: C = Completed, TP = Treatment Planned, EC = Existing Current Provider, EO = Existing Other
- Include ALL visible procedure rows from the table
- Use null for any field that is not visible or readable
- Extract currency values as numbers without $ symbol

Return ONLY the JSON object, no additional text."#;
